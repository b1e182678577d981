use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};

use crate::{
    dto::countdown::{CountdownStarted, StartCountdownRequest},
    error::AppError,
    services::countdown_service,
    state::SharedState,
};

/// Routes driving a room's countdown and alarm.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/rooms/{code}/countdown",
            post(start_countdown).delete(stop_countdown),
        )
        .route("/rooms/{code}/alarm/ack", post(acknowledge_alarm))
}

/// Arm (or re-arm) the room's countdown.
pub async fn start_countdown(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<StartCountdownRequest>,
) -> Result<Json<CountdownStarted>, AppError> {
    let started = countdown_service::start_countdown(&state, &code, payload).await?;
    Ok(Json(started))
}

/// Clear the room's countdown; succeeds on idle rooms too.
pub async fn stop_countdown(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    countdown_service::stop_countdown(&state, &code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Clear the room's alarm flag.
pub async fn acknowledge_alarm(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    countdown_service::acknowledge_alarm(&state, &code).await?;
    Ok(StatusCode::NO_CONTENT)
}
