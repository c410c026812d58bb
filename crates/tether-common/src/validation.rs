//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes.

use validator::Validate;

use crate::error::TetherError;

/// Validate a request body, returning a TetherError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), TetherError> {
    body.validate().map_err(|e| TetherError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

/// Longest conversation id accepted from a client frame.
pub const MAX_CONVERSATION_ID_LEN: usize = 512;

/// Any non-empty id a client could also `join` as `conversation:<id>` is accepted.
pub fn validate_conversation_id(id: &str) -> Result<(), TetherError> {
    if id.trim().is_empty() {
        return Err(TetherError::validation("conversation_id cannot be empty"));
    }
    if id.len() > MAX_CONVERSATION_ID_LEN {
        return Err(TetherError::validation(format!(
            "conversation_id must be at most {MAX_CONVERSATION_ID_LEN} bytes"
        )));
    }
    Ok(())
}
