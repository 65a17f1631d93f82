//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the audit API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CIAF Audit API",
        version = "0.1.0",
        description = "Dataset anchors, inference receipts, and audit reports with engine-bridge or in-process production paths.",
        license(name = "BUSL-1.1")
    ),
    paths(
        crate::routes::anchors::create_anchor,
        crate::routes::anchors::query_anchors,
        crate::routes::receipts::create_receipt,
        crate::routes::receipts::query_receipts,
        crate::routes::receipts::verify_receipt,
        crate::routes::report::generate_report,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::anchors::CreateAnchorRequest,
        crate::routes::anchors::CreateAnchorResponse,
        crate::routes::anchors::AnchorEnvelope,
        crate::routes::anchors::AnchorListing,
        crate::routes::receipts::CreateReceiptRequest,
        crate::routes::receipts::CreateReceiptResponse,
        crate::routes::receipts::ReceiptEnvelope,
        crate::routes::receipts::ReceiptListing,
        crate::routes::receipts::VerifyReceiptResponse,
        crate::routes::report::ReportResponse,
    ))
)]
pub struct ApiDoc;

/// Router serving the generated document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
