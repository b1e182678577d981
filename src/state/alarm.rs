use thiserror::Error;
use tokio::sync::watch;

/// Lifecycle of the local alarm for one countdown cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPhase {
    /// Nothing to present.
    Silent,
    /// The alert is being presented and may be sounding.
    Sounding,
    /// The user dismissed the alert for the current cycle.
    Acknowledged,
}

/// Events that can be applied to the alarm state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    /// The countdown expired (locally or room-wide) and the alert must be presented.
    Raise,
    /// The user dismissed the alert.
    Acknowledge,
    /// The cycle ended without acknowledgment (stop or restart) or a new cycle begins.
    Silence,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid alarm transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// The phase the alarm was in when the invalid event was received.
    pub from: AlarmPhase,
    /// The event that cannot be applied from this phase.
    pub event: AlarmEvent,
}

/// Resolves once the alert it was handed with must stop sounding.
///
/// A single token is issued per raise; acknowledging or silencing the alarm
/// fires it, so a presenter never has to track flags of its own.
#[derive(Debug, Clone)]
pub struct SilenceToken {
    rx: watch::Receiver<bool>,
}

impl SilenceToken {
    /// Whether the alert has already been told to stop.
    pub fn is_silenced(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the alert is silenced. Also resolves if the alarm was torn down.
    pub async fn silenced(&mut self) {
        let _ = self.rx.wait_for(|silenced| *silenced).await;
    }
}

/// Alarm state machine owned by a room subscription.
#[derive(Debug)]
pub struct AlarmMachine {
    phase: AlarmPhase,
    silence: Option<watch::Sender<bool>>,
}

impl Default for AlarmMachine {
    fn default() -> Self {
        Self {
            phase: AlarmPhase::Silent,
            silence: None,
        }
    }
}

impl AlarmMachine {
    /// Create a new alarm machine in the silent state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> AlarmPhase {
        self.phase
    }

    /// Move from `Silent` to `Sounding`, returning the token for the new alert.
    pub fn raise(&mut self) -> Result<SilenceToken, InvalidTransition> {
        self.apply(AlarmEvent::Raise)?;
        let (tx, rx) = watch::channel(false);
        self.silence = Some(tx);
        Ok(SilenceToken { rx })
    }

    /// Apply `event`, firing the current silence token when leaving `Sounding`.
    pub fn apply(&mut self, event: AlarmEvent) -> Result<AlarmPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        if self.phase == AlarmPhase::Sounding && next != AlarmPhase::Sounding {
            if let Some(silence) = self.silence.take() {
                silence.send_replace(true);
            }
        }
        self.phase = next;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: AlarmEvent) -> Result<AlarmPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (AlarmPhase::Silent, AlarmEvent::Raise) => AlarmPhase::Sounding,
            (AlarmPhase::Sounding, AlarmEvent::Acknowledge) => AlarmPhase::Acknowledged,
            (_, AlarmEvent::Silence) => AlarmPhase::Silent,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_silent() {
        let alarm = AlarmMachine::new();
        assert_eq!(alarm.phase(), AlarmPhase::Silent);
    }

    #[test]
    fn full_cycle_through_acknowledgment() {
        let mut alarm = AlarmMachine::new();
        let token = alarm.raise().unwrap();
        assert_eq!(alarm.phase(), AlarmPhase::Sounding);
        assert!(!token.is_silenced());

        assert_eq!(
            alarm.apply(AlarmEvent::Acknowledge),
            Ok(AlarmPhase::Acknowledged)
        );
        assert!(token.is_silenced());

        assert_eq!(alarm.apply(AlarmEvent::Silence), Ok(AlarmPhase::Silent));
    }

    #[test]
    fn stop_while_sounding_fires_the_token() {
        let mut alarm = AlarmMachine::new();
        let token = alarm.raise().unwrap();
        alarm.apply(AlarmEvent::Silence).unwrap();
        assert!(token.is_silenced());
        assert_eq!(alarm.phase(), AlarmPhase::Silent);
    }

    #[test]
    fn raising_twice_is_invalid() {
        let mut alarm = AlarmMachine::new();
        alarm.raise().unwrap();
        let err = alarm.raise().unwrap_err();
        assert_eq!(
            err,
            InvalidTransition {
                from: AlarmPhase::Sounding,
                event: AlarmEvent::Raise,
            }
        );
    }

    #[test]
    fn acknowledging_a_silent_alarm_is_invalid() {
        let mut alarm = AlarmMachine::new();
        assert!(alarm.apply(AlarmEvent::Acknowledge).is_err());
        assert_eq!(alarm.phase(), AlarmPhase::Silent);
    }

    #[test]
    fn acknowledged_alarm_needs_a_new_cycle_before_raising() {
        let mut alarm = AlarmMachine::new();
        alarm.raise().unwrap();
        alarm.apply(AlarmEvent::Acknowledge).unwrap();
        assert!(alarm.raise().is_err());
        alarm.apply(AlarmEvent::Silence).unwrap();
        assert!(alarm.raise().is_ok());
    }

    #[tokio::test]
    async fn silenced_resolves_after_acknowledgment() {
        let mut alarm = AlarmMachine::new();
        let mut token = alarm.raise().unwrap();
        alarm.apply(AlarmEvent::Acknowledge).unwrap();
        token.silenced().await;
        assert!(token.is_silenced());
    }

    #[tokio::test]
    async fn silenced_resolves_when_the_machine_is_dropped() {
        let mut alarm = AlarmMachine::new();
        let mut token = alarm.raise().unwrap();
        drop(alarm);
        token.silenced().await;
    }
}
