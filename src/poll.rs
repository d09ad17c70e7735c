//! Bounded exponential back-off polling.

use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tracing::trace;

/// Polling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollConfig {
    /// Maximum number of probes, at least one probe is always made.
    pub attempts: u32,
    /// Delay before the second probe.
    pub initial_backoff_ms: u64,
    /// Upper bound of the delay between probes.
    pub max_backoff_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { attempts: 12, initial_backoff_ms: 500, max_backoff_ms: 8_000 }
    }
}

impl PollConfig {
    /// Returns the delay before probe number `attempt + 1`, doubling from the initial back-off.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(
            self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms),
        )
    }
}

/// Calls `probe` until it yields a value, an error, or the attempts run out.
///
/// `probe` is called at least once, even with zero attempts configured. Returns `Ok(None)` if every
/// probe came back empty.
pub async fn poll<T, E, F, Fut>(config: &PollConfig, mut probe: F) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    for attempt in 0..config.attempts.max(1) {
        if attempt > 0 {
            let delay = config.backoff(attempt - 1);
            trace!(attempt, ?delay, "Backing off");
            tokio::time::sleep(delay).await;
        }

        if let Some(value) = probe().await? {
            return Ok(Some(value));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_saturates() {
        let config = PollConfig { attempts: 10, initial_backoff_ms: 100, max_backoff_ms: 1_000 };
        assert_eq!(config.backoff(0), Duration::from_millis(100));
        assert_eq!(config.backoff(1), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(800));
        assert_eq!(config.backoff(4), Duration::from_millis(1_000));
        assert_eq!(config.backoff(200), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_value() {
        let calls = AtomicU32::new(0);
        let result: Result<_, ()> = poll(&PollConfig::default(), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok((n == 2).then_some(n))
        })
        .await;

        assert_eq!(result, Ok(Some(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let config = PollConfig { attempts: 4, initial_backoff_ms: 10, max_backoff_ms: 20 };
        let result: Result<Option<()>, ()> = poll(&config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        })
        .await;

        assert_eq!(result, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_polls_once() {
        let calls = AtomicU32::new(0);
        let config = PollConfig { attempts: 0, ..Default::default() };
        let result: Result<_, ()> = poll(&config, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some("included"))
        })
        .await;

        assert_eq!(result, Ok(Some("included")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_stop_polling() {
        let calls = AtomicU32::new(0);
        let result: Result<Option<()>, &str> = poll(&PollConfig::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("boom")
        })
        .await;

        assert_eq!(result, Err("boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
