use axum::Router;

use crate::state::SharedState;

/// Countdown and alarm commands.
pub mod countdown;
/// Health check route.
pub mod health;
/// Room event streams.
pub mod sse;

/// Compose all route trees and wire in shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(countdown::router())
        .with_state(state)
}
