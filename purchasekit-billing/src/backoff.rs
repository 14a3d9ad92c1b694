//! Exponential backoff policy for store service reconnection.

use std::time::Duration;

/// Backoff policy applied between consecutive failed connection attempts.
///
/// Attempt numbering follows the connection state's consecutive-failure
/// count: attempt 0 is the first-ever connect and carries no delay; each
/// failure after that doubles the delay until the cap.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl ReconnectPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
        }
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }

    /// Delay to wait before the given connection attempt.
    ///
    /// `attempt` is the number of consecutive failures so far: 0 means no
    /// failure yet (connect immediately), 1 means retry after the base
    /// delay, and each further failure doubles the delay up to the cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let shift = (attempt - 1).min(20);
        let multiplier = 1_u64 << shift;
        let bounded = self
            .base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms);
        Duration::from_millis(bounded)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(1_000, 30_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_connect_has_no_delay() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn first_retry_uses_base_delay() {
        let policy = ReconnectPolicy::new(1_000, 30_000);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1_000));
    }

    #[test]
    fn delay_doubles_per_failure() {
        let policy = ReconnectPolicy::new(1_000, 30_000);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(8_000));
    }

    #[test]
    fn delay_is_capped() {
        let policy = ReconnectPolicy::new(1_000, 30_000);
        assert_eq!(policy.delay_for_attempt(6), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for_attempt(31), Duration::from_millis(30_000));
    }

    #[test]
    fn large_attempt_counts_do_not_overflow() {
        let policy = ReconnectPolicy::new(u64::MAX / 2, u64::MAX);
        let _ = policy.delay_for_attempt(u32::MAX);
    }
}
