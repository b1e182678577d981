//! Wall-clock sources used to derive remaining time.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use time::OffsetDateTime;

/// Source of the current time in whole epoch seconds.
///
/// Clients are not expected to agree on the exact value; remaining time is
/// always derived against the local reading.
pub trait Clock: Send + Sync {
    /// Current time in whole epoch seconds.
    fn now(&self) -> i64;
}

/// Clock backed by the operating system's UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// Clock whose reading is set explicitly, used to simulate drift and skew.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Arc<AtomicI64>,
}

impl ManualClock {
    /// Clock frozen at `seconds`.
    pub fn new(seconds: i64) -> Self {
        Self {
            seconds: Arc::new(AtomicI64::new(seconds)),
        }
    }

    /// Jump to an absolute reading, forwards or backwards.
    pub fn set(&self, seconds: i64) {
        self.seconds.store(seconds, Ordering::SeqCst);
    }

    /// Move the reading forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.seconds.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.seconds.load(Ordering::SeqCst)
    }
}

/// Clock that follows Tokio's (pausable) timer from a fixed epoch anchor.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokioClock {
    epoch: i64,
    anchor: tokio::time::Instant,
    skew: i64,
}

#[cfg(test)]
impl TokioClock {
    pub(crate) fn new(epoch: i64) -> Self {
        Self {
            epoch,
            anchor: tokio::time::Instant::now(),
            skew: 0,
        }
    }

    /// A copy of this clock running `skew` seconds ahead (negative: behind).
    pub(crate) fn skewed(self, skew: i64) -> Self {
        Self { skew, ..self }
    }
}

#[cfg(test)]
impl Clock for TokioClock {
    fn now(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_secs()).unwrap_or(i64::MAX);
        self.epoch + elapsed + self.skew
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(5);
        assert_eq!(clock.now(), 1_005);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::new(500);
        let ahead = clock.skewed(3);
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        assert_eq!(clock.now(), 502);
        assert_eq!(ahead.now(), 505);
    }
}
