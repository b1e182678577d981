use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    clock::Clock,
    dao::{
        models::RoomTimerState,
        room_store::{RoomPath, RoomStore},
    },
    error::TimerError,
    services::{alert::AlertPresenter, subscription::{self, RoomSubscription}},
    state::room::RoomCode,
};

/// Default upper bound for a countdown: one day.
pub const DEFAULT_MAX_DURATION_SECS: i64 = 86_400;
/// Default re-derivation cadence while a countdown is running.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Tunables for the room timer protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    /// Largest accepted countdown duration, in seconds.
    pub max_duration_secs: i64,
    /// How often a running countdown is re-derived from the clock.
    pub tick_interval: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Per-client owner of the room timer protocol.
///
/// Start, stop and acknowledge write whole records to the shared store;
/// [`subscribe`](Self::subscribe) turns store notifications and clock ticks
/// into countdown views and exactly-once expiry events. Cloning is cheap and
/// every clone acts as the same client.
#[derive(Clone)]
pub struct RoomTimerController {
    inner: Arc<ControllerInner>,
}

#[derive(Clone)]
struct ControllerInner {
    store: Arc<dyn RoomStore>,
    clock: Arc<dyn Clock>,
    client_id: String,
    settings: TimerSettings,
    presenter: Option<Arc<dyn AlertPresenter>>,
}

impl RoomTimerController {
    /// Build a controller acting as a fresh client with a random identifier.
    pub fn new(store: Arc<dyn RoomStore>, clock: Arc<dyn Clock>, settings: TimerSettings) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                store,
                clock,
                client_id: Uuid::new_v4().simple().to_string(),
                settings,
                presenter: None,
            }),
        }
    }

    /// Attach the presenter invoked whenever a subscription raises an alert.
    pub fn with_presenter(mut self, presenter: Arc<dyn AlertPresenter>) -> Self {
        Arc::make_mut(&mut self.inner).presenter = Some(presenter);
        self
    }

    /// Act under a caller-chosen client identifier instead of a random one.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).client_id = client_id.into();
        self
    }

    /// Identifier written as `initiator` on countdowns started by this client.
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Settings this controller was built with.
    pub fn settings(&self) -> TimerSettings {
        self.inner.settings
    }

    pub(crate) fn store(&self) -> &Arc<dyn RoomStore> {
        &self.inner.store
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub(crate) fn presenter(&self) -> Option<&Arc<dyn AlertPresenter>> {
        self.inner.presenter.as_ref()
    }

    /// Arm a countdown of `seconds` in `room`, replacing any running one.
    ///
    /// The record is written as a single value and the room's alarm flag is
    /// cleared afterwards. Concurrent starts are not merged: whichever write
    /// lands last is what every subscriber converges on.
    pub async fn start(&self, room: &str, seconds: i64) -> Result<RoomTimerState, TimerError> {
        let room = RoomCode::parse(room)?;
        let duration = self.validate_duration(seconds)?;

        let state = RoomTimerState {
            start: self.inner.clock.now(),
            duration,
            initiator: self.inner.client_id.clone(),
        };
        let value = state.to_value()?;

        self.inner
            .store
            .write(&RoomPath::timer(&room), Some(value))
            .await?;
        self.clear_alarm(&room).await?;

        info!(
            %room,
            start = state.start,
            duration = state.duration,
            "countdown started"
        );
        Ok(state)
    }

    /// Remove the room's countdown and clear its alarm flag. Stopping an idle room is a no-op.
    pub async fn stop(&self, room: &str) -> Result<(), TimerError> {
        let room = RoomCode::parse(room)?;
        self.inner.store.write(&RoomPath::timer(&room), None).await?;
        self.clear_alarm(&room).await?;
        info!(%room, "countdown stopped");
        Ok(())
    }

    /// Clear the room's alarm flag once the local alert has been dismissed.
    ///
    /// Other clients' open alerts are left alone; the flag only keeps new
    /// joiners from presenting an alarm that was already handled.
    pub async fn acknowledge(&self, room: &str) -> Result<(), TimerError> {
        let room = RoomCode::parse(room)?;
        self.acknowledge_room(&room).await
    }

    pub(crate) async fn acknowledge_room(&self, room: &RoomCode) -> Result<(), TimerError> {
        self.clear_alarm(room).await?;
        info!(%room, "alarm acknowledged");
        Ok(())
    }

    /// Follow `room`: countdown views on every change and tick, expiry at most once per cycle.
    ///
    /// Must be called from within a Tokio runtime. Dropping the returned
    /// subscription stops the ticker and releases the store subscriptions.
    pub fn subscribe(&self, room: &str) -> Result<RoomSubscription, TimerError> {
        let room = RoomCode::parse(room)?;
        Ok(subscription::spawn(self.clone(), room))
    }

    async fn clear_alarm(&self, room: &RoomCode) -> Result<(), TimerError> {
        self.inner
            .store
            .write(&RoomPath::alarm(room), None)
            .await
            .map_err(Into::into)
    }

    fn validate_duration(&self, seconds: i64) -> Result<i64, TimerError> {
        let max = self.inner.settings.max_duration_secs;
        if seconds <= 0 {
            return Err(TimerError::InvalidInput(format!(
                "countdown duration must be positive (got {seconds})"
            )));
        }
        if seconds > max {
            return Err(TimerError::InvalidInput(format!(
                "countdown duration must be at most {max} seconds (got {seconds})"
            )));
        }
        Ok(seconds)
    }
}

/// Raw flag value written when a client observes the falling edge.
pub(crate) fn raised_alarm_value() -> Value {
    Value::Bool(true)
}
