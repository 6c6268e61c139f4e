use std::time::Duration;

use rand::Rng;

/// Exponential backoff for failed logins: doubles from `first`, never exceeds `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    first: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(first: Duration, max: Duration) -> Self {
        let max = max.max(first);
        Self {
            first,
            max,
            current: first,
        }
    }

    /// Delay before the next attempt; advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);

        let jitter_ms = (base.as_millis() / 10).min(u128::from(u64::MAX)) as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };

        (base + jitter).min(self.max)
    }

    pub fn reset(&mut self) {
        self.current = self.first;
    }
}
