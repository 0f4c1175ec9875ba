use std::future::Future;
use std::time::Duration;

use tally_config::RetryConfig;

use crate::GatewayError;

/// Retries transport failures with linear backoff. Every other error is
/// returned on first sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < max => {
                    tracing::warn!(operation = what, attempt, error = %e, "retrying gateway call");
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        Self {
            max_attempts: c.max_attempts,
            backoff: Duration::from_millis(c.backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorResponse;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn transport_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let out = policy(3)
            .run("save", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(GatewayError::Transport("503".into()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(out, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = policy(2)
            .run("save", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::Transport("timeout".into()))
            })
            .await;
        assert!(out.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn conflicts_are_never_retried() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = policy(5)
            .run("claim", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::Conflict(ErrorResponse::new("AlreadyClaimed", "taken")))
            })
            .await;
        assert!(matches!(out, Err(GatewayError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
