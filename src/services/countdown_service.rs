use tracing::debug;
use validator::Validate;

use crate::{
    dto::countdown::{CountdownStarted, StartCountdownRequest},
    error::AppError,
    state::SharedState,
};

/// Arm a countdown in `room` on behalf of an HTTP caller.
pub async fn start_countdown(
    state: &SharedState,
    room: &str,
    payload: StartCountdownRequest,
) -> Result<CountdownStarted, AppError> {
    payload.validate()?;
    let started = state.controller().start(room, payload.seconds).await?;
    Ok(started.into())
}

/// Clear the countdown in `room`.
pub async fn stop_countdown(state: &SharedState, room: &str) -> Result<(), AppError> {
    state.controller().stop(room).await?;
    Ok(())
}

/// Clear the alarm flag of `room`.
pub async fn acknowledge_alarm(state: &SharedState, room: &str) -> Result<(), AppError> {
    debug!(room, "alarm acknowledgment requested over HTTP");
    state.controller().acknowledge(room).await?;
    Ok(())
}
