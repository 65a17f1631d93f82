//! # Wire Protocol — Typed Operation Envelopes
//!
//! One JSON object per line in each direction:
//!
//! - Request: `{"id": <u64>, "operation": <name>, "params": <object>}`
//! - Response: `{"id": <u64>, "success": <bool>, "error"?: <string>,
//!   ...operation-specific fields}`
//!
//! Operations are a serde-tagged union, so malformed parameters fail at
//! this boundary with a structured error instead of propagating opaque
//! JSON into the worker. Operation names are camelCase on the wire
//! (matching the engine's convention); field names are snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use ciaf_core::{AssuranceMode, Commitment, ProvenanceCapsule, ReceiptProof, VerificationStatus};

/// One dataset item submitted for anchoring or capsule creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetItem {
    /// Caller-supplied item identifier, unique within its dataset.
    pub item_id: String,
    /// Item content, opaque to the bridge.
    pub content: Value,
}

/// Anchor summary sent to the worker for report generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAnchorInput {
    /// Dataset the anchor commits to.
    pub dataset_id: String,
    /// Path that produced the anchor.
    pub mode: AssuranceMode,
}

/// Receipt summary sent to the worker for report generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportReceiptInput {
    /// The receipt's identifier.
    pub receipt_id: Uuid,
    /// Verification state at report time.
    pub verification_status: VerificationStatus,
    /// Path that produced the receipt.
    pub mode: AssuranceMode,
}

/// The operations the engine worker implements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "params")]
pub enum EngineOperation {
    /// Seal dataset items into provenance capsules.
    #[serde(rename = "createProvenanceCapsules")]
    CreateProvenanceCapsules {
        /// Dataset the items belong to.
        dataset_id: String,
        /// Items to seal.
        items: Vec<DatasetItem>,
    },

    /// Commit to a dataset's identity, metadata, and capsule batch.
    #[serde(rename = "createDatasetAnchor")]
    CreateDatasetAnchor {
        /// Opaque dataset identifier.
        dataset_id: String,
        /// Caller-supplied metadata, stored verbatim.
        metadata: Map<String, Value>,
        /// Commitments of the dataset's capsules, in batch order.
        capsules: Vec<Commitment>,
    },

    /// Issue a receipt binding an inference's input/output commitments.
    #[serde(rename = "createInferenceReceipt")]
    CreateInferenceReceipt {
        /// Model the inference ran against.
        model_id: String,
        /// Raw input payload; the worker commits to it and discards it.
        input_data: Value,
        /// Raw output prediction; committed and discarded likewise.
        output_prediction: Value,
        /// Model-reported confidence in `[0, 1]`.
        confidence_score: f64,
    },

    /// Check membership of an item in an anchored capsule batch.
    #[serde(rename = "verifyItem")]
    VerifyItem {
        /// The item's identifier.
        item_id: String,
        /// The item's content, re-supplied by the caller.
        content: Value,
        /// The anchor's capsule batch, in original order.
        capsules: Vec<ProvenanceCapsule>,
        /// The anchor's Merkle root.
        merkle_root: Commitment,
    },

    /// Summarize artifacts into a committed audit report.
    #[serde(rename = "generateReport")]
    GenerateReport {
        /// Anchors to summarize.
        anchors: Vec<ReportAnchorInput>,
        /// Receipts to summarize.
        receipts: Vec<ReportReceiptInput>,
    },
}

impl EngineOperation {
    /// The operation's wire name, used in logs and error context.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateProvenanceCapsules { .. } => "createProvenanceCapsules",
            Self::CreateDatasetAnchor { .. } => "createDatasetAnchor",
            Self::CreateInferenceReceipt { .. } => "createInferenceReceipt",
            Self::VerifyItem { .. } => "verifyItem",
            Self::GenerateReport { .. } => "generateReport",
        }
    }
}

/// Request envelope: correlation id plus the tagged operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Monotonically increasing per-bridge correlation id.
    pub id: u64,
    /// The operation and its parameters.
    #[serde(flatten)]
    pub operation: EngineOperation,
}

/// Response envelope: correlation id, outcome, and the operation-specific
/// fields (kept raw here; typed decoding happens per operation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Correlation id echoed from the request.
    pub id: u64,
    /// Whether the worker processed the request successfully.
    pub success: bool,
    /// Worker-reported error message when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Operation-specific response fields.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

/// Successful `createProvenanceCapsules` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapsulesPayload {
    /// The sealed capsules, in item order.
    pub capsules: Vec<ProvenanceCapsule>,
}

/// Successful `createDatasetAnchor` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorPayload {
    /// Commitment over `dataset_id` and `metadata`.
    pub dataset_fingerprint: Commitment,
    /// Merkle root over the capsule batch.
    pub merkle_root: Commitment,
    /// Engine-issued creation time.
    pub created_at: DateTime<Utc>,
}

/// Successful `createInferenceReceipt` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptPayload {
    /// Engine-generated receipt identifier.
    pub receipt_id: Uuid,
    /// Commitment over the input payload.
    pub input_hash: Commitment,
    /// Commitment over the output prediction.
    pub output_hash: Commitment,
    /// Engine-issued proof over the binding.
    pub cryptographic_proof: ReceiptProof,
    /// Engine-issued creation time.
    pub timestamp: DateTime<Utc>,
}

/// Successful `verifyItem` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyItemPayload {
    /// Whether the item is included under the anchor's Merkle root.
    pub is_valid: bool,
}

/// Successful `generateReport` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    /// Engine-generated report identifier.
    pub report_id: Uuid,
    /// Number of anchors summarized.
    pub total_anchors: usize,
    /// Number of receipts summarized.
    pub total_receipts: usize,
    /// Receipts whose last verification succeeded.
    pub verified_receipts: usize,
    /// Commitment over the canonical report content.
    pub report_commitment: Commitment,
    /// Engine-issued generation time.
    pub generated_at: DateTime<Utc>,
}
