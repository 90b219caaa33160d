//! # Custom Extractors & Validation
//!
//! [`Validate`] for request DTOs, helpers that turn JSON rejections into
//! [`AppError::BadRequest`], and [`ClientIp`] for per-visitor keys.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use axum::Json;

use crate::error::AppError;

/// Business-rule checks beyond what serde enforces. The error string is
/// returned to the caller unchanged.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to
/// [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and run its [`Validate`] rules.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::BadRequest)?;
    Ok(value)
}

/// `Some(trimmed)` when `value` has non-whitespace content.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Request extension saying whether the service sits behind a reverse
/// proxy whose `X-Forwarded-For` can be believed. Absent means untrusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustProxy(pub bool);

/// Best-effort client address, else `"unknown"`.
///
/// Without [`TrustProxy`] this is the peer address and `X-Forwarded-For`
/// is ignored, since any client can send it. Behind a trusted proxy it is
/// the last `X-Forwarded-For` hop, the address that proxy saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn from_parts(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let trusted = extensions
            .get::<TrustProxy>()
            .is_some_and(|TrustProxy(trust)| *trust);
        if trusted {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.rsplit(',').next())
                .map(str::trim)
                .filter(|s| !s.is_empty());
            if let Some(ip) = forwarded {
                return Self(ip.to_string());
            }
        }
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| Self(addr.ip().to_string()))
            .unwrap_or_else(|| Self("unknown".to_string()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(&parts.headers, &parts.extensions))
    }
}
