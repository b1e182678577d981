use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use validator::Validate;

use crate::{
    dao::{models::RoomTimerState, room_store::ConnectionStatus},
    dto::format_epoch,
    services::subscription::{ExpiryNotice, ExpiryOrigin},
    state::countdown::{CountdownPhase, CountdownView},
};

/// Payload used to arm a countdown in a room.
#[derive(Debug, Deserialize, Validate)]
pub struct StartCountdownRequest {
    /// Countdown length in seconds.
    #[validate(range(min = 1, message = "seconds must be positive"))]
    pub seconds: i64,
}

/// Record written by a successful start, as returned to the caller.
#[derive(Debug, Serialize)]
pub struct CountdownStarted {
    /// Epoch second the countdown was armed at.
    pub start: i64,
    /// Countdown length in seconds.
    pub duration: i64,
    /// Epoch second the countdown reaches zero.
    pub target_epoch: i64,
    /// `target_epoch` rendered as RFC 3339.
    pub target_at: String,
    /// Client that armed the countdown.
    pub initiator: String,
}

impl From<RoomTimerState> for CountdownStarted {
    fn from(state: RoomTimerState) -> Self {
        let target_epoch = state.target_epoch();
        Self {
            start: state.start,
            duration: state.duration,
            target_epoch,
            target_at: format_epoch(target_epoch),
            initiator: state.initiator,
        }
    }
}

/// `view` event payload.
#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct CountdownViewEvent {
    /// Whole seconds left, never negative.
    pub remaining_seconds: i64,
    /// Whether the countdown is still running.
    pub running: bool,
    /// Derived phase of the countdown.
    pub phase: CountdownPhase,
    /// Remaining time as `MM:SS` (minutes keep growing past 99).
    pub display: String,
    /// Expiry epoch second, absent when the room is idle.
    pub target_epoch: Option<i64>,
}

impl From<CountdownView> for CountdownViewEvent {
    fn from(view: CountdownView) -> Self {
        Self {
            remaining_seconds: view.remaining_seconds,
            running: view.running,
            phase: view.phase(),
            display: format_remaining(view.remaining_seconds),
            target_epoch: view.target_epoch,
        }
    }
}

/// `expired` event payload.
#[derive(Debug, Serialize)]
pub struct ExpiredEvent {
    /// Room whose countdown expired.
    pub room: String,
    /// Start of the expired cycle.
    pub start: i64,
    /// Duration of the expired cycle.
    pub duration: i64,
    /// Epoch second the countdown reached zero.
    pub target_epoch: i64,
    /// Whether the expiry was watched or learnt on joining.
    pub origin: ExpiryOrigin,
}

impl From<&ExpiryNotice> for ExpiredEvent {
    fn from(notice: &ExpiryNotice) -> Self {
        Self {
            room: notice.room.to_string(),
            start: notice.cycle.start,
            duration: notice.cycle.duration,
            target_epoch: notice.target_epoch,
            origin: notice.origin,
        }
    }
}

/// `status` event payload.
#[derive(Debug, Serialize)]
pub struct StoreStatusEvent {
    /// Current link state.
    pub status: ConnectionStatus,
}

/// `write_failed` event payload.
#[derive(Debug, Serialize)]
pub struct WriteFailedEvent {
    /// Description of the failed write.
    pub message: String,
}

/// Render whole seconds as `MM:SS`.
pub fn format_remaining(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
