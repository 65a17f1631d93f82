//! # Audit Report Route
//!
//! - `GET /v1/audit-report` — committed summary of the artifact store.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use ciaf_audit::AuditReport;

use crate::error::AppError;
use crate::state::AppState;

/// Envelope returned by report generation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportResponse {
    pub success: bool,
    /// The generated report, including the path that produced it.
    #[schema(value_type = Object)]
    pub report: AuditReport,
}

/// Build the audit report router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/audit-report", get(generate_report))
}

/// GET /v1/audit-report — generate a committed audit report.
#[utoipa::path(
    get,
    path = "/v1/audit-report",
    responses(
        (status = 200, description = "Report generated", body = ReportResponse),
        (status = 503, description = "Engine and fallback both failed", body = crate::error::ErrorBody),
    ),
    tag = "audit-report"
)]
async fn generate_report(State(state): State<AppState>) -> Result<Json<ReportResponse>, AppError> {
    let report = state.audit.generate_report().await?;
    Ok(Json(ReportResponse { success: true, report }))
}
