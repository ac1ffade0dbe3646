//! Randomized politeness delays

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Inclusive millisecond range a delay is sampled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: Self = Self { min_ms: 0, max_ms: 0 };

    pub const fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self {
            min_ms: min * 1000,
            max_ms: max * 1000,
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }

    /// Uniform sample; a reversed range collapses to its lower bound
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(fastrand::u64(self.min_ms..=self.max_ms))
    }

    /// Sleep for a sampled duration; returns the slept duration
    pub async fn wait(&self) -> Duration {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }
}

impl std::fmt::Display for DelayRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}ms", self.min_ms, self.max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_within_bounds() {
        let range = DelayRange::from_millis(20, 50);
        for _ in 0..200 {
            let d = range.sample().as_millis();
            assert!((20..=50).contains(&d));
        }
    }

    #[test]
    fn test_degenerate_ranges() {
        assert_eq!(DelayRange::ZERO.sample(), Duration::ZERO);
        assert_eq!(DelayRange::from_millis(30, 10).sample(), Duration::from_millis(30));
        assert!(!DelayRange::from_millis(30, 10).is_valid());
        assert_eq!(DelayRange::from_secs(2, 5), DelayRange::from_millis(2000, 5000));
    }

    #[tokio::test]
    async fn test_zero_wait_returns_immediately() {
        assert_eq!(DelayRange::ZERO.wait().await, Duration::ZERO);
    }
}
