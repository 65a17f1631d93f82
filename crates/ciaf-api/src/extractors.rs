//! # Request Extraction & Validation
//!
//! The [`Validate`] trait for request DTOs plus helpers that map JSON
//! deserialization failures to structured 400s instead of Axum's default
//! plain-text rejections.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Business-rule validation beyond what serde deserialization checks.
pub trait Validate {
    /// Validate, returning the offending field and a message on failure.
    fn validate(&self) -> Result<(), (&'static str, String)>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value
        .validate()
        .map_err(|(field, message)| AppError::Validation { field, message })?;
    Ok(value)
}
