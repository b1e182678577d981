use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Countdown commands and room event payloads.
pub mod countdown;
/// Health check payloads.
pub mod health;
/// Server-Sent Events envelopes.
pub mod sse;
/// Input validation helpers.
pub mod validation;

fn format_epoch(epoch: i64) -> String {
    OffsetDateTime::from_unix_timestamp(epoch)
        .ok()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
