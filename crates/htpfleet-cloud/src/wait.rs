//! Fixed-interval polling with an upper bound
//!
//! Rendering is left to the caller: `on_tick` receives the elapsed time after
//! every unsuccessful check and can drive a spinner or a log line.

use crate::error::{CloudError, Result};
use std::time::Duration;
use tokio::time::{Instant, sleep};

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Call `check` every `interval` until it yields a value
///
/// # Returns
/// * `Ok(value)` - `check` returned `Ok(Some(value))`
/// * `Err(CloudError::Timeout)` - `timeout` elapsed first
/// * `Err(e)` - `check` failed; deciding what is retryable is up to `check`
pub async fn poll_until<F, Fut, T, P>(
    config: &PollConfig,
    what: &str,
    mut check: F,
    mut on_tick: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Option<T>>>,
    P: FnMut(Duration),
{
    let start = Instant::now();

    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            tracing::debug!("Gave up waiting for {} after {:?}", what, elapsed);
            return Err(CloudError::Timeout(format!(
                "{} not reached within {}s",
                what,
                config.timeout.as_secs()
            )));
        }

        on_tick(elapsed);

        let remaining = config.timeout - elapsed;
        sleep(config.interval.min(remaining)).await;
    }
}

/// Sleep for `total`, reporting the remaining time once per `step`
pub async fn countdown<P>(total: Duration, step: Duration, mut on_tick: P)
where
    P: FnMut(Duration),
{
    let step = if step.is_zero() { total } else { step };
    let mut remaining = total;

    while !remaining.is_zero() {
        on_tick(remaining);
        let chunk = step.min(remaining);
        sleep(chunk).await;
        remaining -= chunk;
    }
}
