use std::fmt;

use serde::Serialize;

use crate::{dto::validation::validate_room_code, error::TimerError};

/// Identifier of a shared room, trimmed and safe to use as a store path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Parse a user-supplied room code, rejecting empty or path-breaking input.
    pub fn parse(raw: &str) -> Result<Self, TimerError> {
        let code = raw.trim();
        validate_room_code(code).map_err(|err| {
            TimerError::InvalidInput(
                err.message
                    .map(|message| message.into_owned())
                    .unwrap_or_else(|| err.code.into_owned()),
            )
        })?;
        Ok(Self(code.to_string()))
    }

    /// Trimmed room code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
