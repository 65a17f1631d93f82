//! # Error Types — Structured Error Hierarchy
//!
//! Error types shared across the audit core. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Canonicalization errors carry the offending value.
//! - Validation errors name the field they reject, so the request boundary
//!   can surface field-level detail.
//! - Cryptographic errors fail loudly with full context.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Scores and amounts cross the commitment boundary as strings or
    /// integers, never as floats.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in commitment or proof operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// A digest or commitment could not be computed or parsed.
    #[error("commitment error: {0}")]
    Commitment(String),

    /// Proof issuance failed.
    #[error("proof issuance failed: {0}")]
    ProofIssuance(String),

    /// Proof or signature verification failed.
    #[error("verification failed: {0}")]
    VerificationFailed(String),
}

/// Input validation failure, surfaced to callers with field-level detail.
///
/// Validation errors indicate a caller bug, not an infrastructure issue —
/// they never trigger the fallback path.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A required field was absent or empty.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// `confidence_score` must lie in `[0, 1]`, boundary-inclusive.
    #[error("confidence_score must be between 0 and 1 inclusive, got {value}")]
    ConfidenceOutOfRange {
        /// The rejected value.
        value: f64,
    },

    /// A field was present but malformed.
    #[error("{field} is malformed: {reason}")]
    Malformed {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ValidationError {
    /// Name of the field this error rejects.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyField { field } | Self::Malformed { field, .. } => field,
            Self::ConfidenceOutOfRange { .. } => "confidence_score",
        }
    }
}
