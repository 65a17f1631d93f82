//! # Audit Artifacts — Anchors, Capsules, Receipts
//!
//! The artifact model: immutable records binding dataset identities,
//! provenance capsules, and model inferences to commitments, plus the
//! ephemeral verification result produced when an artifact is re-checked.
//!
//! ## Invariants
//!
//! - Artifacts are immutable after creation. Re-anchoring a dataset id
//!   creates a new anchor; receipts issued against the old anchor remain
//!   verifiable against the original commitment.
//! - `input_hash`/`output_hash` are derived from their payloads only:
//!   identical payloads yield identical commitments, and any payload
//!   change yields a different commitment.
//! - Every artifact records the [`AssuranceMode`] of the path that
//!   produced it, so consumers can distinguish engine-issued artifacts
//!   from degraded fallback output without consulting logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::canonical::CanonicalBytes;
use crate::commitment::{commit, Commitment};
use crate::error::{CanonicalizationError, ValidationError};

/// Which production path issued an artifact.
///
/// `bridge` artifacts carry engine-signed proofs; `fallback` artifacts were
/// produced in-process after a bridge failure; `mock` artifacts were
/// produced in-process because the caller did not request the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssuranceMode {
    /// Produced by the external cryptographic engine.
    Bridge,
    /// Produced in-process after the engine path failed.
    Fallback,
    /// Produced in-process because the engine was not requested.
    Mock,
}

impl AssuranceMode {
    /// String form used in API envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Fallback => "fallback",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for AssuranceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification state of an inference receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// Never verified since creation.
    Unverified,
    /// Most recent verification succeeded.
    Verified,
    /// Most recent verification detected an alteration.
    Invalid,
}

impl VerificationStatus {
    /// String form used in API envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Verified => "verified",
            Self::Invalid => "invalid",
        }
    }
}

/// A provenance capsule: one dataset item reduced to a commitment.
///
/// Capsules are the Merkle leaves behind a dataset anchor's `merkle_root`,
/// enabling later inclusion proofs without re-disclosing item content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceCapsule {
    /// Caller-supplied item identifier, unique within its dataset.
    pub item_id: String,
    /// Commitment over the item's content.
    pub content_commitment: Commitment,
}

impl ProvenanceCapsule {
    /// Seal an item into a capsule.
    ///
    /// The commitment covers both the item id and its content, so two
    /// items with identical content but different ids commit differently.
    pub fn seal(item_id: impl Into<String>, content: &Value) -> Result<Self, CanonicalizationError> {
        let item_id = item_id.into();
        let bytes = CanonicalBytes::new(&serde_json::json!({
            "item_id": item_id,
            "content": content,
        }))?;
        Ok(Self {
            item_id,
            content_commitment: commit(&bytes),
        })
    }
}

/// An immutable, timestamped commitment to a dataset's identity and contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetAnchor {
    /// Opaque caller-supplied identifier, unique per logical dataset.
    pub dataset_id: String,
    /// Content commitment derived from `dataset_id` and `metadata`.
    pub dataset_fingerprint: Commitment,
    /// Commitment over the dataset's provenance capsules.
    pub merkle_root: Commitment,
    /// Caller-supplied mapping, stored verbatim, opaque to the engine.
    pub metadata: Map<String, Value>,
    /// Creation time. Set once, immutable thereafter.
    pub created_at: DateTime<Utc>,
    /// Which path produced this anchor.
    pub mode: AssuranceMode,
}

/// Derive a dataset fingerprint from its identity and metadata.
///
/// This is the single derivation both the engine worker and the fallback
/// engine use, so anchors are comparable regardless of which path produced
/// them: same `dataset_id` and `metadata` in, same fingerprint out.
pub fn dataset_fingerprint(
    dataset_id: &str,
    metadata: &Map<String, Value>,
) -> Result<Commitment, CanonicalizationError> {
    let bytes = CanonicalBytes::new(&serde_json::json!({
        "dataset_id": dataset_id,
        "metadata": metadata,
    }))?;
    Ok(commit(&bytes))
}

/// Which scheme issued a receipt proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofScheme {
    /// Ed25519 signature over the canonical proof binding (engine path).
    Ed25519,
    /// Commitment over the canonical proof binding (fallback path).
    Digest,
}

/// An issued proof: scheme tag, proof bytes, and the verifying key for
/// signature schemes.
///
/// Pure data — issuance and verification live in the crypto crate so the
/// scheme set can grow without touching the artifact model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptProof {
    /// Scheme that issued this proof.
    pub scheme: ProofScheme,
    /// Proof bytes, lowercase hex.
    pub proof: String,
    /// Verifying key for signature schemes, lowercase hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifying_key: Option<String>,
}

/// The payload a receipt proof binds: the commitments, the model, and the
/// issuance time. Altering any bound field invalidates the proof.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProofBinding<'a> {
    /// Model identifier the inference ran against.
    pub model_id: &'a str,
    /// Commitment over the input payload.
    pub input_hash: &'a Commitment,
    /// Commitment over the output prediction.
    pub output_hash: &'a Commitment,
    /// Receipt issuance time.
    pub timestamp: DateTime<Utc>,
}

impl ProofBinding<'_> {
    /// Canonical bytes of the binding — the exact payload proofs sign.
    pub fn to_canonical(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        CanonicalBytes::new(self)
    }
}

/// An immutable record binding a model inference to verifiable commitments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceReceipt {
    /// Globally unique identifier generated at creation.
    pub receipt_id: Uuid,
    /// Caller-supplied model identifier.
    pub model_id: String,
    /// One-way commitment of the input payload. Never the raw payload.
    pub input_hash: Commitment,
    /// One-way commitment of the output prediction. Never the raw payload.
    pub output_hash: Commitment,
    /// Confidence reported by the model, in `[0, 1]`.
    pub confidence_score: f64,
    /// Proof binding the hashes, model id, and timestamp.
    pub cryptographic_proof: ReceiptProof,
    /// Verification state.
    pub verification_status: VerificationStatus,
    /// Creation time. Immutable.
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied mapping, stored verbatim.
    pub metadata: Map<String, Value>,
    /// Which path produced this receipt.
    pub mode: AssuranceMode,
}

impl InferenceReceipt {
    /// The binding this receipt's proof was issued over.
    pub fn binding(&self) -> ProofBinding<'_> {
        ProofBinding {
            model_id: &self.model_id,
            input_hash: &self.input_hash,
            output_hash: &self.output_hash,
            timestamp: self.timestamp,
        }
    }
}

/// Commit to an inference payload (input or output).
///
/// Payloads are canonicalized before hashing, so key order never changes
/// the commitment. Floats are rejected by the canonical pipeline; scores
/// inside payloads cross the boundary as strings or integers.
pub fn payload_commitment(payload: &Value) -> Result<Commitment, CanonicalizationError> {
    Ok(commit(&CanonicalBytes::new(payload)?))
}

/// Validate a confidence score: `[0, 1]`, boundary-inclusive, finite.
pub fn validate_confidence(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::ConfidenceOutOfRange { value });
    }
    Ok(())
}

/// Ephemeral result of re-checking an artifact against its commitments.
///
/// Never persisted; produced on demand by re-deriving commitments and
/// comparing against the stored artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Id of the artifact that was checked.
    pub target_id: String,
    /// Overall verdict: all checks passed.
    pub is_valid: bool,
    /// Stored commitments are internally consistent.
    pub integrity_check: bool,
    /// The cryptographic proof verifies against the re-derived binding.
    pub cryptographic_verification: bool,
    /// When this verification ran.
    pub verified_at: DateTime<Utc>,
}
