//! Fixed-delay retry for transient gateway failures

use crate::error::{CloudError, Result};
use std::time::Duration;

/// Retry configuration for gateway calls
///
/// Provisioning runs unattended, so the default bound is very large; it
/// exists so that a permanently broken API ends in a typed error instead of
/// an endless loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay between attempts
    pub delay: Duration,

    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(10),
            max_attempts: 100_000,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy runs out
///
/// Only errors for which [`CloudError::is_transient`] holds are retried.
/// Exhausting the policy yields [`CloudError::Timeout`].
pub async fn retry_transient<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    retry_when(policy, operation_name, CloudError::is_transient, operation).await
}

/// Like [`retry_transient`], with the caller deciding which errors to retry
pub async fn retry_when<F, Fut, T, R>(
    policy: &RetryPolicy,
    operation_name: &str,
    retryable: R,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(&CloudError) -> bool,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !retryable(&e) => return Err(e),
            Err(e) => {
                if attempt >= policy.max_attempts {
                    tracing::error!(
                        operation = %operation_name,
                        attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(CloudError::Timeout(format!(
                        "{} still failing after {} attempts: {}",
                        operation_name, attempt, e
                    )));
                }

                tracing::warn!(
                    operation = %operation_name,
                    attempt,
                    error = %e,
                    delay_ms = policy.delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result = retry_transient(
            &RetryPolicy::fixed(Duration::from_secs(10), 5),
            "reboot",
            move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CloudError::Connection("reset".into()))
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<()> = retry_transient(&RetryPolicy::default(), "reboot", move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(CloudError::Api {
                    status: 400,
                    message: "bad request".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(CloudError::Api { status: 400, .. })));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_a_timeout() {
        let result: Result<()> = retry_transient(
            &RetryPolicy::fixed(Duration::from_secs(5), 3),
            "list agents",
            || async { Err(CloudError::Connection("refused".into())) },
        )
        .await;

        match result {
            Err(CloudError::Timeout(msg)) => assert!(msg.contains("3 attempts")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate_retries_busy() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result = retry_when(
            &RetryPolicy::fixed(Duration::from_secs(10), 10),
            "reboot",
            |e| matches!(e, CloudError::Api { status: 400, .. }),
            move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(CloudError::Api {
                            status: 400,
                            message: "Linode busy.".into(),
                        })
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
