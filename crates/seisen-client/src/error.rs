//! Error types for the upstream clients.

use crate::config::ConfigError;

/// Errors returned by any of the upstream clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure after retries.
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response decoded but lacked something we need.
    #[error("unexpected response from {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },

    /// A caller-supplied value cannot be sent upstream.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Client not configured for the requested operation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// HTTP status reported by the upstream, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn protocol(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

/// Turn a non-success response into [`ClientError::Api`], passing
/// successful responses through.
pub(crate) async fn check_status(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body: truncate(&body, 512),
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
