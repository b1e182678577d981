//! Hand-off between a room subscription and whatever presents its alerts.

use tokio::sync::mpsc;

use crate::{
    error::TimerError,
    services::{
        room_timer::RoomTimerController,
        subscription::{ExpiryNotice, LocalSignal},
    },
    state::{alarm::SilenceToken, countdown::CycleKey, room::RoomCode},
};

/// Presents expiry alerts to the local user (sound, notification, UI banner...).
///
/// Called from the room's task, so implementations must return quickly and
/// move any long-running presentation onto their own task.
pub trait AlertPresenter: Send + Sync {
    /// Show `alert`; it stays live until acknowledged or silenced.
    fn present(&self, alert: Alert);
}

/// One alert raised for one countdown cycle.
#[derive(Debug)]
pub struct Alert {
    notice: ExpiryNotice,
    silence: SilenceToken,
    ack: AckHandle,
}

impl Alert {
    pub(crate) fn new(notice: ExpiryNotice, silence: SilenceToken, ack: AckHandle) -> Self {
        Self {
            notice,
            silence,
            ack,
        }
    }

    /// What expired, and why this client is told.
    pub fn notice(&self) -> &ExpiryNotice {
        &self.notice
    }

    /// Token that resolves once this alert must stop: on acknowledgment, stop or restart.
    pub fn silence_token(&self) -> SilenceToken {
        self.silence.clone()
    }

    /// Dismiss the alert: silence it locally, then clear the room's alarm flag.
    pub async fn acknowledge(self) -> Result<(), TimerError> {
        self.ack.acknowledge().await
    }
}

/// Routes an acknowledgment back to the subscription that raised the alert.
pub(crate) struct AckHandle {
    controller: RoomTimerController,
    room: RoomCode,
    cycle: CycleKey,
    local: mpsc::UnboundedSender<LocalSignal>,
}

impl std::fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckHandle")
            .field("client_id", &self.controller.client_id())
            .field("room", &self.room)
            .field("cycle", &self.cycle)
            .finish()
    }
}

impl AckHandle {
    pub(crate) fn new(
        controller: RoomTimerController,
        room: RoomCode,
        cycle: CycleKey,
        local: mpsc::UnboundedSender<LocalSignal>,
    ) -> Self {
        Self {
            controller,
            room,
            cycle,
            local,
        }
    }

    async fn acknowledge(self) -> Result<(), TimerError> {
        // The subscription may already be gone; the room flag still gets cleared.
        let _ = self.local.send(LocalSignal::Acknowledged(self.cycle));
        self.controller.acknowledge_room(&self.room).await
    }
}
