//! # ciaf-audit — Audit Service and Fallback Engine
//!
//! The single entry point for producing and retrieving audit artifacts.
//! Decides per operation whether to invoke the engine bridge or the
//! in-process fallback engine, guarantees a response regardless of bridge
//! health, and normalizes both paths into the artifact model.
//!
//! ## Fallback Policy
//!
//! - Validation errors never fall back — they indicate a caller bug.
//! - Any bridge error gets exactly one fallback attempt; the result is
//!   tagged `fallback` so consumers can tell degraded artifacts apart.
//! - Both paths failing surfaces [`AuditError::Unavailable`].
//!
//! ## Ownership
//!
//! The service owns the authoritative in-memory stores of anchors and
//! receipts. The bridge and the fallback engine are stateless producers —
//! they never retain artifacts.

pub mod error;
pub mod fallback;
pub mod service;
pub mod store;

pub use error::AuditError;
pub use fallback::{FallbackEngine, FallbackError};
pub use service::{AuditReport, AuditService, ItemVerification};
pub use store::{AnchorEntry, AnchorStore, OrderedStore};
