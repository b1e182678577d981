//! Shared room countdown: start, stop and follow a countdown that every client
//! in a room sees expire once.

/// Wall-clock sources.
pub mod clock;
/// Runtime configuration.
pub mod config;
/// Room store access and stored records.
pub mod dao;
/// HTTP and SSE payloads.
pub mod dto;
/// Error types.
pub mod error;
/// HTTP routes.
pub mod routes;
/// Room timer protocol and HTTP-facing services.
pub mod services;
/// Countdown and alarm state plus shared application state.
pub mod state;
