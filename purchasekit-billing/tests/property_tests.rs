//! Property-based tests for the reconnection backoff policy.

use proptest::prelude::*;
use purchasekit_billing::ReconnectPolicy;

proptest! {
    /// Delays grow strictly until the cap, for any sane base/cap pair.
    #[test]
    fn backoff_is_strictly_increasing_below_cap(
        base_ms in 1_u64..5_000,
        factor in 2_u64..64,
        attempt in 1_u32..16,
    ) {
        let max_ms = base_ms.saturating_mul(factor);
        let policy = ReconnectPolicy::new(base_ms, max_ms);
        let current = policy.delay_for_attempt(attempt);
        let next = policy.delay_for_attempt(attempt + 1);

        if current.as_millis() < max_ms as u128 {
            prop_assert!(next > current, "attempt {} -> {:?} then {:?}", attempt, current, next);
        } else {
            prop_assert_eq!(next, current);
        }
    }

    /// No attempt ever exceeds the cap, and the first retry is nonzero.
    #[test]
    fn backoff_is_bounded_and_starts_nonzero(
        base_ms in 1_u64..10_000,
        max_ms in 10_000_u64..120_000,
        attempt in 1_u32..1_000,
    ) {
        let policy = ReconnectPolicy::new(base_ms, max_ms);
        let delay = policy.delay_for_attempt(attempt);
        prop_assert!(delay.as_millis() > 0);
        prop_assert!(delay.as_millis() <= max_ms as u128);
    }

    /// Attempt numbering alone determines the delay: a reset failure count
    /// reproduces the original first-retry delay exactly.
    #[test]
    fn backoff_depends_only_on_attempt_number(base_ms in 1_u64..10_000, max_ms in 10_000_u64..120_000) {
        let policy = ReconnectPolicy::new(base_ms, max_ms);
        prop_assert_eq!(policy.delay_for_attempt(1), policy.delay_for_attempt(1));
        prop_assert_eq!(policy.delay_for_attempt(0).as_millis(), 0);
    }
}
