//! Validation helpers for DTOs and room identifiers.

use validator::ValidationError;

/// Longest room code accepted, in characters.
pub const MAX_ROOM_CODE_LEN: usize = 64;

/// Validates that a (trimmed) room code can be used as a single store path segment.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("kitchen")  // Ok
/// validate_room_code("")         // Err - empty
/// validate_room_code("a/b")      // Err - path separator
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.is_empty() {
        let mut err = ValidationError::new("room_code_empty");
        err.message = Some("Room code must not be empty".into());
        return Err(err);
    }

    let len = code.chars().count();
    if len > MAX_ROOM_CODE_LEN {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!("Room code must be at most {MAX_ROOM_CODE_LEN} characters (got {len})").into(),
        );
        return Err(err);
    }

    if code.chars().any(|c| c == '/' || c.is_control()) {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must not contain `/` or control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("kitchen").is_ok());
        assert!(validate_room_code("sala 12").is_ok());
        assert!(validate_room_code(&"x".repeat(MAX_ROOM_CODE_LEN)).is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid_length() {
        assert!(validate_room_code("").is_err());
        assert!(validate_room_code(&"x".repeat(MAX_ROOM_CODE_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_room_code_invalid_format() {
        assert!(validate_room_code("a/b").is_err());
        assert!(validate_room_code("tab\there").is_err());
    }
}
