//! Delay windows and how a due instant is picked inside one.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::error::QueueError;

/// Inclusive `[min, max]` delay relative to enqueue time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelayWindow {
    min: Duration,
    max: Duration,
}

impl DelayWindow {
    /// Creates a window, rejecting `min > max`.
    pub fn new(min: Duration, max: Duration) -> Result<Self, QueueError> {
        if min > max {
            return Err(QueueError::InvalidWindow { min, max });
        }
        Ok(Self { min, max })
    }

    /// A zero-width window.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// The `[0, 0]` window (plain FIFO).
    pub fn immediate() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Lower bound.
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Upper bound.
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Scales both bounds by `factor` (clamped at zero).
    pub fn scaled(&self, factor: f64) -> Self {
        let factor = factor.max(0.0);
        let scale = |d: Duration| Duration::from_nanos((d.as_nanos() as f64 * factor).round() as u64);
        Self {
            min: scale(self.min),
            max: scale(self.max),
        }
    }

    /// Uniform random delay inside the window.
    pub fn sample(&self) -> Duration {
        let lo = self.min.as_nanos() as u64;
        let hi = self.max.as_nanos() as u64;
        if lo >= hi {
            return self.min;
        }
        Duration::from_nanos(rand::rng().random_range(lo..=hi))
    }
}

impl Default for DelayWindow {
    fn default() -> Self {
        Self::immediate()
    }
}

/// How the due instant is chosen inside a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelayPick {
    /// Uniformly random.
    Uniform,
    /// A precomputed delay, clamped into the window.
    Exact(Duration),
    /// Uniformly random, but not earlier than the given instant
    /// (and never past the window's upper bound).
    UniformNotBefore(Instant),
}

impl DelayPick {
    /// Resolves the due instant for an item enqueued at `now`.
    pub fn due(&self, now: Instant, window: DelayWindow) -> Instant {
        let earliest = now + window.min;
        let latest = now + window.max;
        let due = match *self {
            DelayPick::Uniform => now + window.sample(),
            DelayPick::Exact(d) => now + d,
            DelayPick::UniformNotBefore(floor) => (now + window.sample()).max(floor),
        };
        due.clamp(earliest, latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_window_rejected() {
        let err = DelayWindow::new(Duration::from_millis(5), Duration::from_millis(1)).unwrap_err();
        assert_eq!(err.as_label(), "queue_invalid_window");
    }

    #[test]
    fn test_sample_stays_inside() {
        let w = DelayWindow::new(Duration::from_millis(30), Duration::from_millis(100)).unwrap();
        for _ in 0..1000 {
            let d = w.sample();
            assert!(d >= w.min() && d <= w.max(), "{d:?} outside window");
        }
    }

    #[test]
    fn test_exact_is_clamped() {
        let now = Instant::now();
        let w = DelayWindow::new(Duration::from_millis(10), Duration::from_millis(20)).unwrap();
        assert_eq!(
            DelayPick::Exact(Duration::from_millis(50)).due(now, w),
            now + Duration::from_millis(20)
        );
        assert_eq!(
            DelayPick::Exact(Duration::ZERO).due(now, w),
            now + Duration::from_millis(10)
        );
    }

    #[test]
    fn test_not_before_respects_floor_and_max() {
        let now = Instant::now();
        let w = DelayWindow::new(Duration::ZERO, Duration::from_millis(100)).unwrap();

        let floor = now + Duration::from_millis(90);
        for _ in 0..100 {
            let due = DelayPick::UniformNotBefore(floor).due(now, w);
            assert!(due >= floor && due <= now + w.max());
        }

        let beyond = now + Duration::from_secs(5);
        assert_eq!(
            DelayPick::UniformNotBefore(beyond).due(now, w),
            now + w.max()
        );
    }

    #[test]
    fn test_scaled_window() {
        let w = DelayWindow::new(Duration::from_millis(100), Duration::from_millis(200)).unwrap();
        let s = w.scaled(0.8);
        assert_eq!(s.min(), Duration::from_millis(80));
        assert_eq!(s.max(), Duration::from_millis(160));
    }
}
