//! Retry policy and backoff schedule for transfers.

use std::time::Duration;

/// How many times to try a transfer and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each later attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before 1-indexed `attempt`: none for the first, then
    /// `base * 2^(attempt - 2)`.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt < 2 {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Iterate over the 1-indexed attempt numbers this policy allows.
    pub fn attempts(&self) -> impl Iterator<Item = u32> {
        1..=self.max_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_schedule() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };

        assert_eq!(policy.delay_before(1), None);
        assert_eq!(policy.delay_before(2), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_before(3), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_before(4), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay_before(5), Some(Duration::from_millis(800)));
    }

    #[test]
    fn test_schedule_is_non_decreasing() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (2..40).filter_map(|k| policy.delay_before(k)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_attempts_never_zero() {
        let policy = RetryPolicy {
            max_attempts: 0,
            base_delay: Duration::ZERO,
        };
        assert_eq!(policy.attempts().count(), 1);
        assert_eq!(RetryPolicy::default().attempts().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
