//! Exponential backoff with jitter for startup connection retries.

use std::time::Duration;

use rand::Rng;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 10,
        }
    }
}

impl BackoffConfig {
    /// Un-jittered delay to wait after the given failed attempt (1-based).
    ///
    /// The result is clamped to [`BackoffConfig::max_delay`].
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay with "full jitter": uniformly random in `[base/2, base]`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let ms = rand::rng().random_range(base / 2..=base);
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_then_caps() {
        let config = BackoffConfig::default();
        assert_eq!(config.base_delay(1), Duration::from_secs(1));
        assert_eq!(config.base_delay(2), Duration::from_secs(2));
        assert_eq!(config.base_delay(3), Duration::from_secs(4));
        assert_eq!(config.base_delay(6), Duration::from_secs(30));
        assert_eq!(config.base_delay(40), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = BackoffConfig::default();
        for attempt in 1..=10 {
            let base = config.base_delay(attempt);
            let jittered = config.jittered_delay(attempt);
            assert!(jittered <= base);
            assert!(jittered >= base / 2);
        }
    }

    #[test]
    fn zero_initial_delay_never_sleeps() {
        let config = BackoffConfig {
            initial_delay: Duration::ZERO,
            ..BackoffConfig::default()
        };
        assert_eq!(config.jittered_delay(3), Duration::ZERO);
    }
}
