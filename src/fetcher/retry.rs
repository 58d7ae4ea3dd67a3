/// Bounded retry with exponential backoff and jitter
///
/// RPC calls retry faster and fewer times than bulk REST parsing calls;
/// non-retryable failures propagate immediately.
use crate::errors::FeeWatchError;
use crate::logger::{self, LogTag};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Tuning for JSON-RPC calls: quick, few attempts
    pub fn rpc() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 4_000,
        }
    }

    /// Tuning for bulk REST parsing calls: slower, more patient
    pub fn rest() -> Self {
        Self {
            max_retries: 4,
            base_delay_ms: 1_000,
            max_delay_ms: 15_000,
        }
    }
}

/// Run an upstream call, retrying transient failures with backoff + jitter
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, FeeWatchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FeeWatchError>>,
{
    let mut attempts = 0u32;
    let mut delay = policy.base_delay_ms;

    loop {
        match call().await {
            Ok(value) => {
                if attempts > 0 {
                    logger::debug(
                        LogTag::Rpc,
                        "RETRY_OK",
                        &format!("{} succeeded after {} retries", operation, attempts),
                    );
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempts < policy.max_retries => {
                attempts += 1;
                let jittered = delay / 2 + rand::thread_rng().gen_range(0..=delay / 2);
                logger::warning(
                    LogTag::Rpc,
                    "RETRY",
                    &format!(
                        "{} attempt {} failed, retrying in {}ms: {}",
                        operation, attempts, jittered, e
                    ),
                );
                sleep(Duration::from_millis(jittered)).await;
                delay = (delay * 2).min(policy.max_delay_ms);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{NetworkError, RpcError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[tokio::test]
    async fn test_transient_failure_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FeeWatchError::Network(NetworkError::Generic {
                        message: "reset".to_string(),
                    }))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(FeeWatchError::Rpc(RpcError::ClientError {
                    endpoint: "rpc".to_string(),
                    status: 400,
                    body: "bad".to_string(),
                }))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_surfaces_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(FeeWatchError::Rpc(RpcError::RateLimitExceeded {
                    endpoint: "rpc".to_string(),
                }))
            }
        })
        .await;
        assert!(result.is_err());
        // Initial attempt plus max_retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
