//! Countdown re-derivation from the shared `(start, duration)` pair.
//!
//! Every client computes its own view from the shared record and its local
//! clock. Nothing here counts down on its own: each evaluation starts over
//! from `target_epoch - now`.

use serde::Serialize;

use crate::dao::models::RoomTimerState;

/// Per-client view of a room's countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountdownView {
    /// Seconds left before the target epoch; never negative.
    pub remaining_seconds: i64,
    /// Whether the countdown is still running.
    pub running: bool,
    /// Absolute epoch second of expiry, `None` when no countdown is active.
    pub target_epoch: Option<i64>,
}

impl CountdownView {
    /// View used when the room has no active countdown.
    pub const IDLE: Self = Self {
        remaining_seconds: 0,
        running: false,
        target_epoch: None,
    };

    /// Phase this view falls in.
    pub fn phase(&self) -> CountdownPhase {
        match (self.target_epoch, self.running) {
            (None, _) => CountdownPhase::Idle,
            (Some(_), true) => CountdownPhase::Counting,
            (Some(_), false) => CountdownPhase::Expired,
        }
    }
}

/// Derived phase of a room's countdown as seen by one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownPhase {
    /// No shared record.
    Idle,
    /// Record present and time remaining.
    Counting,
    /// Record present and the target epoch has been reached.
    Expired,
}

/// Derive the countdown view for `state` at local time `now`.
pub fn compute(state: Option<&RoomTimerState>, now: i64) -> CountdownView {
    let Some(state) = state else {
        return CountdownView::IDLE;
    };

    let target_epoch = state.target_epoch();
    let remaining_seconds = target_epoch.saturating_sub(now).max(0);
    CountdownView {
        remaining_seconds,
        running: remaining_seconds > 0,
        target_epoch: Some(target_epoch),
    }
}

/// Identity of one countdown cycle; a new start always yields a new key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CycleKey {
    /// Start epoch second of the cycle.
    pub start: i64,
    /// Duration of the cycle in seconds.
    pub duration: i64,
}

impl From<&RoomTimerState> for CycleKey {
    fn from(state: &RoomTimerState) -> Self {
        Self {
            start: state.start,
            duration: state.duration,
        }
    }
}

/// What changed between two consecutive evaluations of the same room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Nothing noteworthy; the view may still show a different remaining time.
    Unchanged,
    /// A new cycle was first seen while it was still counting.
    CycleStarted(CycleKey),
    /// The current cycle went from counting to expired under our eyes.
    FallingEdge(CycleKey),
    /// A new cycle was first seen already expired (late join, long suspension).
    AlreadyExpired(CycleKey),
    /// The shared record disappeared.
    Cleared,
}

/// Tracks successive views of one room to detect the falling edge exactly once per cycle.
#[derive(Debug, Clone)]
pub struct ExpiryTracker {
    cycle: Option<CycleKey>,
    phase: CountdownPhase,
    expired_once: bool,
}

impl Default for ExpiryTracker {
    fn default() -> Self {
        Self {
            cycle: None,
            phase: CountdownPhase::Idle,
            expired_once: false,
        }
    }
}

impl ExpiryTracker {
    /// Tracker that has not seen any cycle yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase seen at the last observation.
    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    /// Cycle seen at the last observation.
    pub fn cycle(&self) -> Option<CycleKey> {
        self.cycle
    }

    /// Feed the latest record and the view computed from it.
    pub fn observe(&mut self, state: Option<&RoomTimerState>, view: &CountdownView) -> Observation {
        let cycle = state.map(CycleKey::from);
        let phase = view.phase();

        if cycle != self.cycle {
            self.cycle = cycle;
            self.phase = phase;
            self.expired_once = false;
            return match (cycle, phase) {
                (None, _) | (Some(_), CountdownPhase::Idle) => Observation::Cleared,
                (Some(key), CountdownPhase::Counting) => Observation::CycleStarted(key),
                (Some(key), CountdownPhase::Expired) => {
                    self.expired_once = true;
                    Observation::AlreadyExpired(key)
                }
            };
        }

        let previous = std::mem::replace(&mut self.phase, phase);
        match (cycle, previous, phase) {
            (Some(key), CountdownPhase::Counting, CountdownPhase::Expired) if !self.expired_once => {
                self.expired_once = true;
                Observation::FallingEdge(key)
            }
            _ => Observation::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: i64, duration: i64) -> RoomTimerState {
        RoomTimerState {
            start,
            duration,
            initiator: "tester".into(),
        }
    }

    fn step(tracker: &mut ExpiryTracker, state: Option<&RoomTimerState>, now: i64) -> Observation {
        let view = compute(state, now);
        tracker.observe(state, &view)
    }

    #[test]
    fn no_record_is_idle() {
        let view = compute(None, 1_000);
        assert_eq!(view, CountdownView::IDLE);
        assert_eq!(view.phase(), CountdownPhase::Idle);
    }

    #[test]
    fn one_second_before_target_is_still_running() {
        let state = record(1_000, 30);
        let view = compute(Some(&state), 1_029);
        assert_eq!(view.remaining_seconds, 1);
        assert!(view.running);
        assert_eq!(view.target_epoch, Some(1_030));
    }

    #[test]
    fn target_and_beyond_are_zero_and_stopped() {
        let state = record(1_000, 30);
        let at_target = compute(Some(&state), 1_030);
        assert_eq!(at_target.remaining_seconds, 0);
        assert!(!at_target.running);

        let later = compute(Some(&state), 5_000);
        assert_eq!(later.remaining_seconds, 0);
        assert!(!later.running);
        assert_eq!(later.phase(), CountdownPhase::Expired);
    }

    #[test]
    fn skew_shifts_only_the_displayed_value() {
        let state = record(2_000, 60);
        let behind = compute(Some(&state), 2_010);
        let ahead = compute(Some(&state), 2_013);
        assert_eq!(behind.remaining_seconds - ahead.remaining_seconds, 3);
        assert_eq!(behind.target_epoch, ahead.target_epoch);
        assert_eq!(state.start + state.duration, 2_060);
    }

    #[test]
    fn falling_edge_is_reported_once() {
        let state = record(0, 2);
        let mut tracker = ExpiryTracker::new();

        assert_eq!(
            step(&mut tracker, Some(&state), 0),
            Observation::CycleStarted(CycleKey { start: 0, duration: 2 })
        );
        assert_eq!(step(&mut tracker, Some(&state), 1), Observation::Unchanged);
        assert_eq!(
            step(&mut tracker, Some(&state), 2),
            Observation::FallingEdge(CycleKey { start: 0, duration: 2 })
        );
        assert_eq!(step(&mut tracker, Some(&state), 3), Observation::Unchanged);
        assert_eq!(tracker.phase(), CountdownPhase::Expired);
    }

    #[test]
    fn clock_stepping_back_does_not_refire() {
        let state = record(0, 2);
        let mut tracker = ExpiryTracker::new();
        step(&mut tracker, Some(&state), 1);
        assert!(matches!(
            step(&mut tracker, Some(&state), 2),
            Observation::FallingEdge(_)
        ));
        assert_eq!(step(&mut tracker, Some(&state), 1), Observation::Unchanged);
        assert_eq!(step(&mut tracker, Some(&state), 2), Observation::Unchanged);
    }

    #[test]
    fn late_join_is_not_a_falling_edge() {
        let state = record(0, 5);
        let mut tracker = ExpiryTracker::new();
        assert_eq!(
            step(&mut tracker, Some(&state), 60),
            Observation::AlreadyExpired(CycleKey { start: 0, duration: 5 })
        );
        assert_eq!(step(&mut tracker, Some(&state), 61), Observation::Unchanged);
    }

    #[test]
    fn new_start_begins_a_fresh_cycle() {
        let first = record(0, 10);
        let second = record(2, 5);
        let mut tracker = ExpiryTracker::new();

        step(&mut tracker, Some(&first), 0);
        assert_eq!(
            step(&mut tracker, Some(&second), 2),
            Observation::CycleStarted(CycleKey { start: 2, duration: 5 })
        );
        assert_eq!(tracker.cycle(), Some(CycleKey { start: 2, duration: 5 }));
        assert!(matches!(
            step(&mut tracker, Some(&second), 7),
            Observation::FallingEdge(CycleKey { start: 2, .. })
        ));
    }

    #[test]
    fn stop_clears_the_cycle() {
        let state = record(0, 10);
        let mut tracker = ExpiryTracker::new();
        step(&mut tracker, Some(&state), 0);
        assert_eq!(step(&mut tracker, None, 1), Observation::Cleared);
        assert_eq!(tracker.phase(), CountdownPhase::Idle);
        assert_eq!(step(&mut tracker, None, 2), Observation::Unchanged);
    }
}
