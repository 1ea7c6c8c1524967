//! Bounded exponential backoff for transient provider failures.

use docforge_config::RetryConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_retries: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            base,
            max,
            max_retries,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.base_delay(),
            config.max_delay(),
            config.max_transient_retries,
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the `retry`-th retry (1-based): base, 2·base, 4·base, ... capped at max.
    ///
    /// `None` once the retry budget is spent.
    pub fn delay(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }
        let factor = 2u32.checked_pow(retry - 1).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let b = Backoff::new(Duration::from_millis(250), Duration::from_millis(1_000), 5);
        assert_eq!(b.delay(1), Some(Duration::from_millis(250)));
        assert_eq!(b.delay(2), Some(Duration::from_millis(500)));
        assert_eq!(b.delay(3), Some(Duration::from_millis(1_000)));
        assert_eq!(b.delay(5), Some(Duration::from_millis(1_000)));
    }

    #[test]
    fn budget_is_bounded() {
        let b = Backoff::default();
        assert_eq!(b.max_retries(), 3);
        assert!(b.delay(3).is_some());
        assert_eq!(b.delay(4), None);
        assert_eq!(b.delay(0), None);
    }

    #[test]
    fn huge_retry_counts_do_not_overflow() {
        let b = Backoff::new(Duration::from_secs(1), Duration::from_secs(30), u32::MAX);
        assert_eq!(b.delay(64), Some(Duration::from_secs(30)));
    }
}
