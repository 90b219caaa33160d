//! # Admin Authentication
//!
//! The dashboard logs in with the shared `ADMIN_PASSWORD` and receives a
//! random session token. Admin routes accept either that token or the
//! password itself as `Authorization: Bearer <value>`.
//!
//! Comparisons are constant-time. With no password configured every
//! login and every admin call is rejected.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::typed_header::TypedHeaderRejection;
use axum_extra::TypedHeader;
use dashmap::DashMap;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::AppError;

/// How long a login token stays valid.
pub const SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Shared admin credential state.
#[derive(Clone)]
pub struct AdminAuth {
    password: Option<Arc<Zeroizing<String>>>,
    sessions: Arc<DashMap<String, Instant>>,
    ttl: Duration,
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl AdminAuth {
    pub fn new(password: Option<Zeroizing<String>>) -> Self {
        Self::with_ttl(password, SESSION_TTL)
    }

    pub fn with_ttl(password: Option<Zeroizing<String>>, ttl: Duration) -> Self {
        Self {
            password: password.filter(|p| !p.is_empty()).map(Arc::new),
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.password.is_some()
    }

    /// Exchange the password for a session token (32 random bytes, hex).
    pub fn login(&self, candidate: &str) -> Option<String> {
        if !self.password_matches(candidate) {
            return None;
        }
        self.prune();
        let token = hex::encode(rand::random::<[u8; 32]>());
        self.sessions
            .insert(token.clone(), Instant::now() + self.ttl);
        Some(token)
    }

    /// Whether `credential` is the password or a live session token.
    pub fn verify(&self, credential: &str) -> bool {
        if self.password.is_none() {
            return false;
        }
        if self.password_matches(credential) {
            return true;
        }
        let now = Instant::now();
        let live = self
            .sessions
            .get(credential)
            .map(|expires| now < *expires)
            .unwrap_or(false);
        if !live {
            self.sessions.remove_if(credential, |_, expires| now >= *expires);
        }
        live
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, expires| now < *expires);
        before - self.sessions.len()
    }

    fn password_matches(&self, candidate: &str) -> bool {
        match &self.password {
            Some(expected) => constant_time_eq(candidate, expected.as_str()),
            None => false,
        }
    }
}

/// Constant-time string comparison. Unequal lengths still perform a
/// comparison so timing does not reveal the length.
fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Middleware guarding `/api/admin/*` (except login).
pub async fn require_admin(
    State(auth): State<AdminAuth>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = match &bearer {
        Ok(TypedHeader(Authorization(token))) => auth.verify(token.token()),
        Err(_) => false,
    };
    if !authorized {
        tracing::warn!(
            path = %request.uri().path(),
            header_present = bearer.is_ok(),
            "admin request rejected"
        );
        return AppError::Unauthorized("Unauthorized".into()).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> AdminAuth {
        AdminAuth::new(Some(Zeroizing::new("hunter2".to_string())))
    }

    #[test]
    fn test_login_issues_hex_token() {
        let auth = auth();
        let token = auth.login("hunter2").unwrap();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(auth.verify(&token));
    }

    #[test]
    fn test_wrong_password_rejected() {
        let auth = auth();
        assert!(auth.login("hunter3").is_none());
        assert!(auth.login("").is_none());
        assert!(!auth.verify("nope"));
    }

    #[test]
    fn test_password_itself_is_accepted() {
        assert!(auth().verify("hunter2"));
    }

    #[test]
    fn test_unconfigured_rejects_everything() {
        let auth = AdminAuth::new(None);
        assert!(!auth.is_configured());
        assert!(auth.login("").is_none());
        assert!(!auth.verify(""));

        let blank = AdminAuth::new(Some(Zeroizing::new(String::new())));
        assert!(!blank.is_configured());
    }

    #[test]
    fn test_expired_session_is_rejected_and_pruned() {
        let auth = AdminAuth::with_ttl(Some(Zeroizing::new("pw".into())), Duration::ZERO);
        let token = auth.login("pw").unwrap();
        assert!(!auth.verify(&token));
        assert_eq!(auth.prune(), 0);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("ab", "abc"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let dbg = format!("{:?}", auth());
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("REDACTED"));
    }
}
