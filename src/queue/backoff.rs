//! Retry backoff for failed operations.
//!
//! After failed attempt `n` an operation waits
//! `min(base * multiplier^(n-1), max)`, optionally spread by ±25% jitter.

use std::time::Duration;

use rand::Rng;

/// Fraction of the delay that jitter may add or remove.
const JITTER_RATIO: f64 = 0.25;

// == Backoff Policy ==
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Retry on the very next drain.
    pub fn none() -> Self {
        Self {
            base: Duration::ZERO,
            max: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Deterministic exponential backoff.
    pub fn exponential(base: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            base,
            max,
            multiplier,
            jitter: false,
        }
    }

    // == Delay ==
    /// Delay to wait after `attempt` failed attempts (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay_ms(attempt);
        if !self.jitter || capped == 0.0 {
            return Duration::from_millis(capped as u64);
        }

        let spread = capped * JITTER_RATIO;
        let jittered = capped + rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis(jittered.max(0.0) as u64)
    }

    fn capped_delay_ms(&self, attempt: u32) -> f64 {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let raw = self.base.as_millis() as f64 * self.multiplier.max(1.0).powi(exponent);
        raw.min(self.max.as_millis() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_zero() {
        let policy = BackoffPolicy::none();
        for attempt in 1..5 {
            assert_eq!(policy.delay(attempt), Duration::ZERO);
        }
    }

    #[test]
    fn test_exponential_growth_and_cap() {
        let policy = BackoffPolicy::exponential(
            Duration::from_millis(100),
            Duration::from_millis(1_000),
            2.0,
        );

        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
        assert_eq!(policy.delay(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay(60), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = BackoffPolicy {
            jitter: true,
            ..BackoffPolicy::exponential(Duration::from_millis(1_000), Duration::from_secs(60), 2.0)
        };

        for _ in 0..200 {
            let delay = policy.delay(2).as_millis();
            assert!((1_500..=2_500).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base, Duration::from_secs(1));
        assert_eq!(policy.max, Duration::from_secs(30));
        assert!(policy.jitter);
    }
}
