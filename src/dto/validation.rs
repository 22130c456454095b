//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::session::{ROOM_CODE_LENGTH, is_valid_room_code};

const MAX_CATEGORY_CHARS: usize = 64;

/// Validates that a room code is exactly four ASCII digits.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("0420") // Ok
/// validate_room_code("420")  // Err - too short
/// validate_room_code("04a0") // Err - not a digit
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if is_valid_room_code(code) {
        return Ok(());
    }
    let mut err = ValidationError::new("room_code_format");
    err.message = Some(format!("Room code must be exactly {ROOM_CODE_LENGTH} digits").into());
    Err(err)
}

/// Validates that a category label is non-blank and reasonably short.
pub fn validate_category(category: &str) -> Result<(), ValidationError> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("category_blank");
        err.message = Some("Category must not be blank".into());
        return Err(err);
    }
    if trimmed.chars().count() > MAX_CATEGORY_CHARS {
        let mut err = ValidationError::new("category_length");
        err.message =
            Some(format!("Category must be at most {MAX_CATEGORY_CHARS} characters").into());
        return Err(err);
    }
    Ok(())
}
