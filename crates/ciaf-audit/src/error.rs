//! # Audit Service Errors
//!
//! The caller-facing error taxonomy. Validation and not-found errors are
//! recoverable caller errors; `Unavailable` means both the bridge and the
//! fallback path failed and is fatal for that call.

use thiserror::Error;

use ciaf_core::ValidationError;

/// Error from the audit service.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Malformed or out-of-range input. Never triggers the fallback path.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No artifact with the requested id.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Artifact kind ("dataset anchor", "inference receipt").
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// Both the bridge and the fallback path failed.
    #[error("audit service unavailable: bridge path failed ({bridge}); fallback path failed ({fallback})")]
    Unavailable {
        /// Why the bridge path failed.
        bridge: String,
        /// Why the fallback path failed.
        fallback: String,
    },
}

impl AuditError {
    /// Shorthand for an anchor lookup miss.
    pub fn anchor_not_found(dataset_id: &str) -> Self {
        Self::NotFound { kind: "dataset anchor", id: dataset_id.to_string() }
    }

    /// Shorthand for a receipt lookup miss.
    pub fn receipt_not_found(receipt_id: impl ToString) -> Self {
        Self::NotFound { kind: "inference receipt", id: receipt_id.to_string() }
    }
}
