use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Shared countdown record stored under `rooms/{code}/timer`.
///
/// `start` and `duration` always travel together as one JSON object so a
/// reader can never pair a fresh start with a stale duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomTimerState {
    /// Epoch seconds (writer's clock) when the countdown was armed.
    pub start: i64,
    /// Seconds counted from `start`; always positive.
    pub duration: i64,
    /// Opaque identifier of the writer, kept for diagnostics only.
    #[serde(default)]
    pub initiator: String,
}

impl RoomTimerState {
    /// Absolute epoch second at which the countdown reaches zero.
    pub fn target_epoch(&self) -> i64 {
        self.start.saturating_add(self.duration)
    }

    /// Encode the record as the JSON value written to the store.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Decode a stored value, treating malformed or non-positive records as absent.
    pub fn from_value(value: Option<Value>) -> Option<Self> {
        let value = value?;
        if value.is_null() {
            return None;
        }

        match serde_json::from_value::<Self>(value) {
            Ok(state) if state.duration > 0 => Some(state),
            Ok(state) => {
                warn!(
                    start = state.start,
                    duration = state.duration,
                    "ignoring timer record with non-positive duration"
                );
                None
            }
            Err(err) => {
                warn!(error = %err, "ignoring malformed timer record");
                None
            }
        }
    }
}

/// Decode the shared alarm flag stored under `rooms/{code}/alarm`.
///
/// Only an explicit `true` counts as raised; absent, `null` and anything else read as `false`.
pub fn alarm_flag_from_value(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn record_encodes_start_and_duration_together() {
        let state = RoomTimerState {
            start: 1_000,
            duration: 30,
            initiator: "client-a".into(),
        };
        let value = state.to_value().unwrap();
        assert_eq!(
            value,
            json!({"start": 1_000, "duration": 30, "initiator": "client-a"})
        );
        assert_eq!(RoomTimerState::from_value(Some(value)), Some(state));
    }

    #[test]
    fn null_and_missing_records_are_absent() {
        assert_eq!(RoomTimerState::from_value(None), None);
        assert_eq!(RoomTimerState::from_value(Some(Value::Null)), None);
    }

    #[test]
    fn incomplete_or_non_positive_records_are_ignored() {
        let missing_duration = json!({"start": 10, "initiator": "x"});
        let zero_duration = json!({"start": 10, "duration": 0, "initiator": "x"});
        let negative = json!({"start": 10, "duration": -4, "initiator": "x"});
        assert_eq!(RoomTimerState::from_value(Some(missing_duration)), None);
        assert_eq!(RoomTimerState::from_value(Some(zero_duration)), None);
        assert_eq!(RoomTimerState::from_value(Some(negative)), None);
    }

    #[test]
    fn record_without_initiator_is_still_armed() {
        let state = RoomTimerState::from_value(Some(json!({"start": 10, "duration": 5}))).unwrap();
        assert_eq!(state.target_epoch(), 15);
        assert_eq!(state.initiator, "");
    }

    #[test]
    fn target_epoch_is_start_plus_duration() {
        let state = RoomTimerState {
            start: 100,
            duration: 25,
            initiator: String::new(),
        };
        assert_eq!(state.target_epoch(), 125);
    }

    #[test]
    fn only_true_raises_the_alarm_flag() {
        assert!(alarm_flag_from_value(Some(&json!(true))));
        assert!(!alarm_flag_from_value(Some(&json!(false))));
        assert!(!alarm_flag_from_value(Some(&Value::Null)));
        assert!(!alarm_flag_from_value(Some(&json!("true"))));
        assert!(!alarm_flag_from_value(None));
    }
}
