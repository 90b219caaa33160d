//! Retry with exponential backoff for upstream requests.
//!
//! Only transport errors are retried. A response with any status code is
//! returned as-is; callers decide what a 4xx or 5xx means for their
//! operation.
//!
//! Requests with upstream side effects (minting keys, capturing a payment)
//! go through [`send_unrepeatable`], which retries only when the connection
//! was never established. A timeout on such a request may mean the upstream
//! already acted, so it is surfaced instead of replayed.

use std::future::Future;
use std::time::Duration;

/// Backoff schedule for [`send_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled each time.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Three retries starting at 200ms.
    pub const STANDARD: Self = Self {
        max_retries: 3,
        base_delay: Duration::from_millis(200),
    };

    /// Single attempt. Used for fire-and-forget notifications.
    pub const NONE: Self = Self {
        max_retries: 0,
        base_delay: Duration::ZERO,
    };

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Run `send` until it yields a response or the policy is exhausted.
pub(crate) async fn send_with_retry<F, Fut>(
    policy: RetryPolicy,
    endpoint: &str,
    send: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    send_retrying_when(policy, endpoint, |_| true, send).await
}

/// Like [`send_with_retry`], but only connect failures are retried.
pub(crate) async fn send_unrepeatable<F, Fut>(
    policy: RetryPolicy,
    endpoint: &str,
    send: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    send_retrying_when(policy, endpoint, reqwest::Error::is_connect, send).await
}

async fn send_retrying_when<F, Fut>(
    policy: RetryPolicy,
    endpoint: &str,
    retryable: fn(&reqwest::Error) -> bool,
    send: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        match send().await {
            Ok(resp) => return Ok(resp),
            Err(e) if attempt < policy.max_retries && retryable(&e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    "upstream request failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn delay_doubles() {
        let p = RetryPolicy::STANDARD;
        assert_eq!(p.delay_for(0), Duration::from_millis(200));
        assert_eq!(p.delay_for(1), Duration::from_millis(400));
        assert_eq!(p.delay_for(2), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn exhausts_retries_on_connection_refused() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = reqwest::Client::new();
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        };

        let counter = calls.clone();
        let result = send_with_retry(policy, "closed-port", || {
            counter.fetch_add(1, Ordering::SeqCst);
            client.get("http://127.0.0.1:1/").send()
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_retry_policy_makes_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = reqwest::Client::new();
        let counter = calls.clone();
        let result = send_with_retry(RetryPolicy::NONE, "closed-port", || {
            counter.fetch_add(1, Ordering::SeqCst);
            client.get("http://127.0.0.1:1/").send()
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrepeatable_still_retries_refused_connections() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = reqwest::Client::new();
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        };

        let counter = calls.clone();
        let result = send_unrepeatable(policy, "closed-port", || {
            counter.fetch_add(1, Ordering::SeqCst);
            client.post("http://127.0.0.1:1/").send()
        })
        .await;

        assert!(result.unwrap_err().is_connect());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unrepeatable_does_not_resend_after_timeout() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        };
        let url = mock_server.uri();
        let result = send_unrepeatable(policy, "slow", || client.post(url.as_str()).send()).await;

        assert!(result.unwrap_err().is_timeout());
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
    }
}
