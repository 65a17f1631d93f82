//! # Dataset Anchor Routes
//!
//! - `POST /v1/dataset-anchor` — create an anchor (bridge or in-process).
//! - `GET /v1/dataset-anchor?dataset_id=X` — latest anchor for a dataset.
//! - `GET /v1/dataset-anchor` — full listing with count.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use ciaf_bridge::protocol::DatasetItem;
use ciaf_core::{AssuranceMode, DatasetAnchor};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Request to create a dataset anchor.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAnchorRequest {
    /// Opaque dataset identifier.
    pub dataset_id: String,
    /// Caller-supplied metadata, stored verbatim.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Map<String, Value>,
    /// Dataset items to seal into provenance capsules.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<DatasetItem>,
    /// Attempt the engine bridge; falls back in-process on bridge errors.
    #[serde(default)]
    pub use_bridge: bool,
}

impl Validate for CreateAnchorRequest {
    fn validate(&self) -> Result<(), (&'static str, String)> {
        if self.dataset_id.trim().is_empty() {
            return Err(("dataset_id", "dataset_id must not be empty".to_string()));
        }
        for item in &self.items {
            if item.item_id.trim().is_empty() {
                return Err(("items.item_id", "item_id must not be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Envelope returned by anchor creation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateAnchorResponse {
    pub success: bool,
    /// The created anchor.
    #[schema(value_type = Object)]
    pub dataset_anchor: DatasetAnchor,
    /// Which path produced it: `bridge`, `fallback`, or `mock`.
    #[schema(value_type = String)]
    pub mode: AssuranceMode,
}

/// Query parameters for anchor lookup.
#[derive(Debug, Deserialize)]
pub struct AnchorQuery {
    /// When present, return the latest anchor for this dataset only.
    pub dataset_id: Option<String>,
}

/// Envelope for a single-anchor lookup.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnchorEnvelope {
    pub success: bool,
    #[schema(value_type = Object)]
    pub dataset_anchor: DatasetAnchor,
}

/// Envelope for the full anchor listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnchorListing {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub dataset_anchors: Vec<DatasetAnchor>,
    pub count: usize,
}

/// Either a single anchor or the full listing, depending on the query.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnchorQueryResponse {
    Single(AnchorEnvelope),
    Listing(AnchorListing),
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the dataset anchor router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/dataset-anchor", get(query_anchors).post(create_anchor))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /v1/dataset-anchor — create a dataset anchor.
#[utoipa::path(
    post,
    path = "/v1/dataset-anchor",
    request_body = CreateAnchorRequest,
    responses(
        (status = 201, description = "Anchor created", body = CreateAnchorResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 503, description = "Engine and fallback both failed", body = crate::error::ErrorBody),
    ),
    tag = "dataset-anchor"
)]
async fn create_anchor(
    State(state): State<AppState>,
    body: Result<Json<CreateAnchorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateAnchorResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let anchor = state
        .audit
        .create_dataset_anchor(&req.dataset_id, req.metadata, req.items, req.use_bridge)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateAnchorResponse { success: true, mode: anchor.mode, dataset_anchor: anchor }),
    ))
}

/// GET /v1/dataset-anchor — latest anchor for a dataset, or the listing.
#[utoipa::path(
    get,
    path = "/v1/dataset-anchor",
    params(("dataset_id" = Option<String>, Query, description = "Dataset to look up")),
    responses(
        (status = 200, description = "Anchor or listing", body = AnchorListing),
        (status = 404, description = "Unknown dataset", body = crate::error::ErrorBody),
    ),
    tag = "dataset-anchor"
)]
async fn query_anchors(
    State(state): State<AppState>,
    Query(query): Query<AnchorQuery>,
) -> Result<Json<AnchorQueryResponse>, AppError> {
    match query.dataset_id {
        Some(dataset_id) => {
            let anchor = state.audit.get_anchor(&dataset_id)?;
            Ok(Json(AnchorQueryResponse::Single(AnchorEnvelope {
                success: true,
                dataset_anchor: anchor,
            })))
        }
        None => {
            let anchors = state.audit.list_anchors();
            Ok(Json(AnchorQueryResponse::Listing(AnchorListing {
                success: true,
                count: anchors.len(),
                dataset_anchors: anchors,
            })))
        }
    }
}
