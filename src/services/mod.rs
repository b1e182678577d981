/// Alert presentation hook and acknowledgment handle.
pub mod alert;
/// HTTP-facing countdown commands.
pub mod countdown_service;
/// Health check service.
pub mod health_service;
/// Room timer protocol: start, stop, acknowledge and subscribe.
pub mod room_timer;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming of room subscriptions.
pub mod sse_service;
/// Per-room event loop driving countdown views and expiry.
pub mod subscription;
