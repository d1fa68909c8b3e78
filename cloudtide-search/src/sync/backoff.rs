//! Exponential retry delays with an optional jitter.

use std::time::Duration;

use cloudtide_core::SearchSyncConfig;
use rand::Rng;

/// Largest fraction of a delay added as jitter.
const MAX_JITTER_FRACTION: f64 = 0.1;

/// Stateful exponential backoff.
///
/// Each call to [`next_delay`](Backoff::next_delay) during a failure streak
/// returns a delay no smaller than the previous one and never above the
/// ceiling. [`reset`](Backoff::reset) starts a new streak at the minimum.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    ceiling: Duration,
    factor: f64,
    jitter: bool,
    current: Duration,
}

impl Backoff {
    /// Creates a doubling backoff between `initial` and `ceiling`.
    pub fn new(initial: Duration, ceiling: Duration) -> Self {
        let initial = initial.min(ceiling);
        Self {
            initial,
            ceiling,
            factor: 2.0,
            jitter: false,
            current: initial,
        }
    }

    /// Creates a backoff from the sync configuration.
    pub fn from_config(config: &SearchSyncConfig) -> Self {
        Self::new(config.initial_backoff, config.backoff_ceiling)
            .with_factor(config.backoff_factor)
            .with_jitter(config.backoff_jitter)
    }

    /// Sets the growth factor. Factors below 1 are treated as 1.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the delay before the next retry and advances the streak.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = Duration::try_from_secs_f64(base.as_secs_f64() * self.factor)
            .unwrap_or(self.ceiling)
            .max(base)
            .min(self.ceiling);

        if self.jitter {
            self.jittered(base, self.current)
        } else {
            base
        }
    }

    /// Starts a new failure streak at the initial delay.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Delay returned by the first retry of a streak.
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// Largest delay this backoff returns.
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    // Jitter never reaches past the next base delay, keeping the streak non-decreasing
    fn jittered(&self, base: Duration, next: Duration) -> Duration {
        let spread = ((base.as_nanos() as f64 * MAX_JITTER_FRACTION) as u64)
            .min((next - base).as_nanos() as u64);
        if spread == 0 {
            return base;
        }

        base + Duration::from_nanos(rand::rng().random_range(0..=spread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_delays_double_until_ceiling() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1000));

        let delays: Vec<u128> = (0..6).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(60));
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_initial_above_ceiling_is_clamped() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(1));
        assert_eq!(backoff.initial(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_config_schedule() {
        let mut backoff = Backoff::from_config(&SearchSyncConfig::default());
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.ceiling(), Duration::from_secs(1800));

        for _ in 0..40 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(1800));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff =
            Backoff::new(Duration::from_millis(100), Duration::from_secs(5)).with_jitter(true);

        let first = backoff.next_delay();
        assert!(first >= Duration::from_millis(100));
        assert!(first <= Duration::from_millis(110));
    }

    proptest! {
        #[test]
        fn prop_delays_are_monotonic_and_bounded(
            initial_ms in 1u64..5_000,
            extra_ms in 0u64..3_600_000,
            factor in 1.0f64..4.0,
            jitter in any::<bool>(),
            steps in 1usize..60,
        ) {
            let initial = Duration::from_millis(initial_ms);
            let ceiling = Duration::from_millis(initial_ms + extra_ms);
            let mut backoff = Backoff::new(initial, ceiling)
                .with_factor(factor)
                .with_jitter(jitter);

            let mut previous = Duration::ZERO;
            for _ in 0..steps {
                let delay = backoff.next_delay();
                prop_assert!(delay >= previous);
                prop_assert!(delay <= ceiling);
                prop_assert!(delay >= initial);
                previous = delay;
            }

            backoff.reset();
            let restarted = backoff.next_delay();
            prop_assert!(restarted >= initial);
            if !jitter {
                prop_assert_eq!(restarted, initial);
            }
        }
    }
}
