use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        countdown::{CountdownViewEvent, ExpiredEvent, StoreStatusEvent, WriteFailedEvent},
        sse::{Handshake, ServerEvent},
    },
    services::subscription::RoomEvent,
    state::room::RoomCode,
};

const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_VIEW: &str = "view";
const EVENT_EXPIRED: &str = "expired";
const EVENT_STATUS: &str = "status";
const EVENT_WRITE_FAILED: &str = "write_failed";

/// First event sent on a room stream.
pub fn handshake(room: &RoomCode) -> Option<ServerEvent> {
    let payload = Handshake {
        room: room.to_string(),
        message: "room stream connected".into(),
    };
    encode(EVENT_HANDSHAKE, &payload)
}

/// Translate a room event into its SSE representation.
pub fn room_event(event: &RoomEvent) -> Option<ServerEvent> {
    match event {
        RoomEvent::View(view) => encode(EVENT_VIEW, &CountdownViewEvent::from(*view)),
        RoomEvent::Expired(notice) => encode(EVENT_EXPIRED, &ExpiredEvent::from(notice)),
        RoomEvent::Status(status) => encode(EVENT_STATUS, &StoreStatusEvent { status: *status }),
        RoomEvent::WriteFailed(err) => encode(
            EVENT_WRITE_FAILED,
            &WriteFailedEvent {
                message: err.to_string(),
            },
        ),
    }
}

fn encode<T: Serialize>(event: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialise SSE payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        dao::{room_store::ConnectionStatus, storage::StorageError},
        error::TimerError,
        services::subscription::{ExpiryNotice, ExpiryOrigin},
        state::countdown::{CountdownView, CycleKey},
    };

    fn data(event: &ServerEvent) -> Value {
        serde_json::from_str(&event.data).unwrap()
    }

    #[test]
    fn view_events_carry_the_display_string() {
        let event = room_event(&RoomEvent::View(CountdownView {
            remaining_seconds: 75,
            running: true,
            target_epoch: Some(1_075),
        }))
        .unwrap();
        assert_eq!(event.event.as_deref(), Some("view"));
        assert_eq!(data(&event)["display"], "01:15");
        assert_eq!(data(&event)["phase"], "counting");
    }

    #[test]
    fn expired_events_name_their_origin() {
        let notice = ExpiryNotice {
            room: RoomCode::parse("loft").unwrap(),
            cycle: CycleKey {
                start: 10,
                duration: 5,
            },
            target_epoch: 15,
            origin: ExpiryOrigin::AlarmInProgress,
        };
        let event = room_event(&RoomEvent::Expired(notice)).unwrap();
        assert_eq!(event.event.as_deref(), Some("expired"));
        assert_eq!(
            data(&event),
            json!({
                "room": "loft",
                "start": 10,
                "duration": 5,
                "target_epoch": 15,
                "origin": "alarm_in_progress",
            })
        );
    }

    #[test]
    fn status_and_write_failures_are_forwarded() {
        let status = room_event(&RoomEvent::Status(ConnectionStatus::Disconnected)).unwrap();
        assert_eq!(data(&status), json!({ "status": "disconnected" }));

        let failed = room_event(&RoomEvent::WriteFailed(TimerError::Disconnected(
            StorageError::disconnected("rooms/loft/alarm"),
        )))
        .unwrap();
        assert_eq!(failed.event.as_deref(), Some("write_failed"));
        assert_eq!(data(&failed)["message"], "room store disconnected");
    }
}
