//! Time source abstraction (Design Note §9): the simulation executor
//! measures and sleeps through a `Clock` rather than calling
//! `tokio::time` directly, so time compression and deterministic tests
//! of S3/S5 don't require real sleeps.

use std::time::Duration;

use async_trait::async_trait;

/// A source of "simulated now" plus the ability to wait for simulated
/// durations to elapse. Implementations decide how simulated time maps
/// to wall-clock time.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Simulated seconds elapsed since this clock was started.
    fn elapsed_secs(&self) -> i64;

    /// Suspend the caller until `duration` of simulated time has
    /// elapsed, per this clock's wall-clock mapping.
    async fn sleep(&self, duration: Duration);
}

/// Real-time clock: one simulated second is one wall-clock second.
/// Used by the burst executor and by simulation runs at `scale == 1`.
pub struct RealClock {
    start: std::time::Instant,
}

impl RealClock {
    /// Start a new real-time clock, `elapsed_secs()` measured from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for RealClock {
    fn elapsed_secs(&self) -> i64 {
        self.start.elapsed().as_secs() as i64
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Time-compressed clock: `scale` simulated seconds pass per wall-clock
/// second (§4.5: `scale` in `1..=24`).
pub struct SimulatedClock {
    start: std::time::Instant,
    scale: u8,
}

impl SimulatedClock {
    /// Start a new simulated clock compressing time by `scale`.
    ///
    /// # Panics
    /// Panics if `scale` is zero.
    #[must_use]
    pub fn new(scale: u8) -> Self {
        assert!(scale >= 1, "scale must be at least 1");
        Self {
            start: std::time::Instant::now(),
            scale,
        }
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn elapsed_secs(&self) -> i64 {
        (self.start.elapsed().as_secs_f64() * f64::from(self.scale)) as i64
    }

    async fn sleep(&self, duration: Duration) {
        let wall = duration.div_f64(f64::from(self.scale));
        tokio::time::sleep(wall).await;
    }
}

/// A deterministic clock for tests: `elapsed_secs()` is controlled
/// externally via `advance`, and `sleep` returns immediately after
/// recording the requested duration. Never used outside `#[cfg(test)]`
/// code in this crate or downstream crates' test modules.
pub struct FrozenClock {
    elapsed: parking_lot::Mutex<i64>,
}

impl FrozenClock {
    /// Start a frozen clock at `elapsed_secs() == 0`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            elapsed: parking_lot::Mutex::new(0),
        }
    }

    /// Advance the frozen clock by `secs` simulated seconds.
    pub fn advance(&self, secs: i64) {
        *self.elapsed.lock() += secs;
    }
}

impl Default for FrozenClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for FrozenClock {
    fn elapsed_secs(&self) -> i64 {
        *self.elapsed.lock()
    }

    async fn sleep(&self, duration: Duration) {
        #[allow(clippy::cast_possible_wrap)]
        self.advance(duration.as_secs() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock as _, FrozenClock};
    use std::time::Duration;

    #[tokio::test]
    async fn frozen_clock_advances_on_sleep() {
        let clock = FrozenClock::new();
        assert_eq!(clock.elapsed_secs(), 0);
        clock.sleep(Duration::from_secs(5)).await;
        assert_eq!(clock.elapsed_secs(), 5);
        clock.advance(10);
        assert_eq!(clock.elapsed_secs(), 15);
    }
}
