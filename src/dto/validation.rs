//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dto::session::RecordEventRequest;

/// Validates that an explicit play value matches the canonical value of its stat type.
///
/// # Examples
///
/// ```ignore
/// // PTS_3 with value 3 -> Ok, PTS_3 with value 2 -> Err, FOUL without value -> Ok
/// ```
pub fn validate_canonical_value(request: &RecordEventRequest) -> Result<(), ValidationError> {
    let canonical = request.stat_type.canonical_value();
    match request.value {
        Some(value) if value != canonical => {
            let mut err = ValidationError::new("stat_value");
            err.message = Some(
                format!(
                    "{:?} is worth {canonical} (got {value})",
                    request.stat_type
                )
                .into(),
            );
            Err(err)
        }
        _ => Ok(()),
    }
}
