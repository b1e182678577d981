/// Local alarm state machine.
pub mod alarm;
/// Countdown derivation and expiry tracking.
pub mod countdown;
/// Room identifiers.
pub mod room;

use std::sync::Arc;

use crate::{
    clock::Clock,
    dao::room_store::RoomStore,
    services::room_timer::{RoomTimerController, TimerSettings},
};

/// Cheaply cloneable handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Central application state shared by every HTTP handler.
pub struct AppState {
    controller: RoomTimerController,
    store: Arc<dyn RoomStore>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The server acts as a single client of the room store: every countdown it
    /// starts carries the same initiator.
    pub fn new(
        store: Arc<dyn RoomStore>,
        clock: Arc<dyn Clock>,
        settings: TimerSettings,
    ) -> SharedState {
        let controller = RoomTimerController::new(store.clone(), clock, settings);
        Arc::new(Self { controller, store })
    }

    /// Room timer protocol used by the countdown routes.
    pub fn controller(&self) -> &RoomTimerController {
        &self.controller
    }

    /// Room store the controller writes to, exposed for health checks.
    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }
}
