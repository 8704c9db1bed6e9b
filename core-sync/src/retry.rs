//! Retry policies for remote fetches

use bridge_traits::error::BridgeError;
use core_runtime::config::SyncSettings;
use std::time::Duration;

/// Decides whether and when a failed remote fetch is attempted again.
pub trait RetryPolicy: Send + Sync {
    /// Delay before the next attempt, or `None` to give up.
    ///
    /// `attempt` is the number of attempts that have failed so far, starting
    /// at 1.
    fn delay_for(&self, attempt: u32, error: &BridgeError) -> Option<Duration>;
}

/// Never retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn delay_for(&self, _attempt: u32, _error: &BridgeError) -> Option<Duration> {
        None
    }
}

/// Retry transient failures with doubling delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Retries after the first failure
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default())
    }
}

impl ExponentialBackoff {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(
            settings.max_retries,
            Duration::from_millis(settings.retry_base_delay_ms),
            Duration::from_millis(settings.retry_max_delay_ms),
        )
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn delay_for(&self, attempt: u32, error: &BridgeError) -> Option<Duration> {
        if !error.is_transient() || attempt == 0 || attempt > self.max_attempts {
            return None;
        }

        let factor = 2u32.saturating_pow(attempt - 1);
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> BridgeError {
        BridgeError::Transport("connection reset".to_string())
    }

    #[test]
    fn test_no_retry() {
        assert_eq!(NoRetry.delay_for(1, &transport()), None);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy =
            ExponentialBackoff::new(5, Duration::from_millis(100), Duration::from_millis(500));

        assert_eq!(policy.delay_for(1, &transport()), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2, &transport()), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3, &transport()), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_for(4, &transport()), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(6, &transport()), None);
    }

    #[test]
    fn test_backoff_skips_permanent_errors() {
        let policy = ExponentialBackoff::default();
        assert!(policy.delay_for(1, &BridgeError::Timeout(30_000)).is_some());
        assert_eq!(
            policy.delay_for(1, &BridgeError::OperationFailed("bad request".to_string())),
            None
        );
    }
}
