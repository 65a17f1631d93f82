//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers via
//! the `State` extractor. Holds the audit service (which in turn owns the
//! artifact stores and the optional engine bridge).

use std::sync::Arc;

use ciaf_audit::AuditService;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The orchestrating audit service.
    pub audit: Arc<AuditService>,
}

impl AppState {
    /// State over a bridge-less audit service (every operation in-process).
    pub fn new() -> Self {
        Self { audit: Arc::new(AuditService::new()) }
    }

    /// State over a pre-built audit service.
    pub fn with_service(audit: Arc<AuditService>) -> Self {
        Self { audit }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
