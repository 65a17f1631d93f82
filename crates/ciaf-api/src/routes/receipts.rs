//! # Inference Receipt Routes
//!
//! - `POST /v1/inference` — issue a receipt for an inference.
//! - `GET /v1/inference?receipt_id=X` — receipt lookup.
//! - `GET /v1/inference` — full listing with count.
//! - `POST /v1/inference/:receipt_id/verify` — re-verify a receipt.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use ciaf_core::{AssuranceMode, InferenceReceipt, VerificationResult};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Request to issue an inference receipt.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReceiptRequest {
    /// Model the inference ran against.
    pub model_id: String,
    /// Raw input payload; only its commitment is retained.
    #[schema(value_type = Object)]
    pub input_data: Value,
    /// Raw output prediction; only its commitment is retained.
    #[schema(value_type = Object)]
    pub output_prediction: Value,
    /// Model-reported confidence in `[0, 1]`, boundary-inclusive.
    pub confidence_score: f64,
    /// Caller-supplied metadata, stored verbatim.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Map<String, Value>,
}

impl Validate for CreateReceiptRequest {
    fn validate(&self) -> Result<(), (&'static str, String)> {
        if self.model_id.trim().is_empty() {
            return Err(("model_id", "model_id must not be empty".to_string()));
        }
        if !self.confidence_score.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_score)
        {
            return Err((
                "confidence_score",
                format!(
                    "confidence_score must be between 0 and 1 inclusive, got {}",
                    self.confidence_score
                ),
            ));
        }
        Ok(())
    }
}

/// Envelope returned by receipt creation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateReceiptResponse {
    pub success: bool,
    /// The issued receipt.
    #[schema(value_type = Object)]
    pub receipt: InferenceReceipt,
    /// Which path issued it: `bridge`, `fallback`, or `mock`.
    #[schema(value_type = String)]
    pub mode: AssuranceMode,
}

/// Query parameters for receipt lookup.
#[derive(Debug, Deserialize)]
pub struct ReceiptQuery {
    /// When present, return this receipt only.
    pub receipt_id: Option<Uuid>,
}

/// Envelope for a single-receipt lookup.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptEnvelope {
    pub success: bool,
    #[schema(value_type = Object)]
    pub receipt: InferenceReceipt,
}

/// Envelope for the full receipt listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptListing {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub receipts: Vec<InferenceReceipt>,
    pub count: usize,
}

/// Either a single receipt or the full listing, depending on the query.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ReceiptQueryResponse {
    Single(ReceiptEnvelope),
    Listing(ReceiptListing),
}

/// Envelope returned by receipt verification.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyReceiptResponse {
    pub success: bool,
    /// The verification outcome with per-check detail.
    #[schema(value_type = Object)]
    pub verification: VerificationResult,
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the inference receipt router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/inference", get(query_receipts).post(create_receipt))
        .route("/v1/inference/:receipt_id/verify", post(verify_receipt))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/inference — issue an inference receipt.
#[utoipa::path(
    post,
    path = "/v1/inference",
    request_body = CreateReceiptRequest,
    responses(
        (status = 201, description = "Receipt issued", body = CreateReceiptResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 503, description = "Engine and fallback both failed", body = crate::error::ErrorBody),
    ),
    tag = "inference"
)]
async fn create_receipt(
    State(state): State<AppState>,
    body: Result<Json<CreateReceiptRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateReceiptResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let receipt = state
        .audit
        .create_inference_receipt(
            &req.model_id,
            req.input_data,
            req.output_prediction,
            req.confidence_score,
            req.metadata,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateReceiptResponse { success: true, mode: receipt.mode, receipt }),
    ))
}

/// GET /v1/inference — receipt lookup or the full listing.
#[utoipa::path(
    get,
    path = "/v1/inference",
    params(("receipt_id" = Option<Uuid>, Query, description = "Receipt to look up")),
    responses(
        (status = 200, description = "Receipt or listing", body = ReceiptListing),
        (status = 404, description = "Unknown receipt", body = crate::error::ErrorBody),
    ),
    tag = "inference"
)]
async fn query_receipts(
    State(state): State<AppState>,
    Query(query): Query<ReceiptQuery>,
) -> Result<Json<ReceiptQueryResponse>, AppError> {
    match query.receipt_id {
        Some(receipt_id) => {
            let receipt = state.audit.get_receipt(receipt_id)?;
            Ok(Json(ReceiptQueryResponse::Single(ReceiptEnvelope { success: true, receipt })))
        }
        None => {
            let receipts = state.audit.list_receipts();
            Ok(Json(ReceiptQueryResponse::Listing(ReceiptListing {
                success: true,
                count: receipts.len(),
                receipts,
            })))
        }
    }
}

/// POST /v1/inference/:receipt_id/verify — re-verify a stored receipt.
#[utoipa::path(
    post,
    path = "/v1/inference/{receipt_id}/verify",
    params(("receipt_id" = Uuid, Path, description = "Receipt to verify")),
    responses(
        (status = 200, description = "Verification result", body = VerifyReceiptResponse),
        (status = 404, description = "Unknown receipt", body = crate::error::ErrorBody),
    ),
    tag = "inference"
)]
async fn verify_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> Result<Json<VerifyReceiptResponse>, AppError> {
    let verification = state.audit.verify_receipt(receipt_id)?;
    Ok(Json(VerifyReceiptResponse { success: true, verification }))
}
