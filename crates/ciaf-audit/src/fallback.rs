//! # Fallback Engine — In-Process Stand-In for the Engine Worker
//!
//! Produces anchors, capsules, and receipts with no external process,
//! used when the bridge is unavailable or not requested. It runs the same
//! commitment pipeline as the engine worker — same `dataset_id` and
//! `metadata` yield the same fingerprint on either path — but issues
//! digest-binding proofs instead of Ed25519 signatures. That assurance
//! gap is what the `fallback`/`mock` mode tags surface to consumers.
//!
//! Stateless: every method is a pure producer over its arguments plus the
//! clock; artifacts are retained by the audit service, never here.

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use ciaf_bridge::protocol::{
    AnchorPayload, DatasetItem, ReceiptPayload, ReportAnchorInput, ReportPayload,
    ReportReceiptInput,
};
use ciaf_core::artifact::payload_commitment;
use ciaf_core::{
    commit, dataset_fingerprint, CanonicalBytes, CanonicalizationError, Commitment, CryptoError,
    ProofBinding, ProvenanceCapsule,
};
use ciaf_crypto::{issue_digest_proof, merkle_root, prove_inclusion, verify_inclusion};
use serde_json::{Map, Value};

/// Error from the fallback engine.
///
/// After boundary validation these should not occur; the service maps any
/// residue into its unavailability error.
#[derive(Error, Debug)]
pub enum FallbackError {
    /// Input could not be canonicalized.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// Proof issuance failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Deterministic in-process producer of audit artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEngine;

impl FallbackEngine {
    /// Create a fallback engine.
    pub fn new() -> Self {
        Self
    }

    /// Seal dataset items into provenance capsules.
    pub fn seal_capsules(
        &self,
        items: &[DatasetItem],
    ) -> Result<Vec<ProvenanceCapsule>, FallbackError> {
        items
            .iter()
            .map(|item| {
                ProvenanceCapsule::seal(item.item_id.clone(), &item.content)
                    .map_err(FallbackError::from)
            })
            .collect()
    }

    /// Commit to a dataset's identity, metadata, and capsule batch.
    pub fn anchor_dataset(
        &self,
        dataset_id: &str,
        metadata: &Map<String, Value>,
        capsules: &[Commitment],
    ) -> Result<AnchorPayload, FallbackError> {
        Ok(AnchorPayload {
            dataset_fingerprint: dataset_fingerprint(dataset_id, metadata)?,
            merkle_root: merkle_root(capsules),
            created_at: Utc::now(),
        })
    }

    /// Issue an inference receipt with a digest-binding proof.
    pub fn issue_receipt(
        &self,
        model_id: &str,
        input_data: &Value,
        output_prediction: &Value,
    ) -> Result<ReceiptPayload, FallbackError> {
        let input_hash = payload_commitment(input_data)?;
        let output_hash = payload_commitment(output_prediction)?;
        let timestamp = Utc::now();
        let binding = ProofBinding {
            model_id,
            input_hash: &input_hash,
            output_hash: &output_hash,
            timestamp,
        };
        let cryptographic_proof = issue_digest_proof(&binding)?;
        Ok(ReceiptPayload {
            receipt_id: Uuid::new_v4(),
            input_hash,
            output_hash,
            cryptographic_proof,
            timestamp,
        })
    }

    /// Check membership of an item in an anchored capsule batch.
    ///
    /// The item must appear in the batch under its id with a matching
    /// content commitment, and its inclusion must verify against the root.
    pub fn verify_item(
        &self,
        item_id: &str,
        content: &Value,
        capsules: &[ProvenanceCapsule],
        root: &Commitment,
    ) -> Result<bool, FallbackError> {
        let resealed = ProvenanceCapsule::seal(item_id, content)?;
        let Some(index) = capsules.iter().position(|c| c.item_id == item_id) else {
            return Ok(false);
        };
        if capsules[index].content_commitment != resealed.content_commitment {
            return Ok(false);
        }
        let batch: Vec<Commitment> =
            capsules.iter().map(|c| c.content_commitment.clone()).collect();
        let included = prove_inclusion(&batch, index)
            .map(|proof| verify_inclusion(root, &batch[index], &proof))
            .unwrap_or(false);
        Ok(included)
    }

    /// Summarize artifacts into a committed audit report.
    ///
    /// The commitment covers the artifact summaries and totals but not the
    /// generation time, so an unchanged store yields an identical
    /// `report_commitment` on repeat runs.
    pub fn generate_report(
        &self,
        anchors: &[ReportAnchorInput],
        receipts: &[ReportReceiptInput],
    ) -> Result<ReportPayload, FallbackError> {
        let verified = receipts
            .iter()
            .filter(|r| r.verification_status == ciaf_core::VerificationStatus::Verified)
            .count();
        let content = CanonicalBytes::new(&serde_json::json!({
            "anchors": anchors,
            "receipts": receipts,
            "total_anchors": anchors.len(),
            "total_receipts": receipts.len(),
            "verified_receipts": verified,
        }))?;
        Ok(ReportPayload {
            report_id: Uuid::new_v4(),
            total_anchors: anchors.len(),
            total_receipts: receipts.len(),
            verified_receipts: verified,
            report_commitment: commit(&content),
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciaf_core::{AssuranceMode, ProofScheme, VerificationStatus};
    use ciaf_crypto::verify_receipt_proof;

    fn items(n: usize) -> Vec<DatasetItem> {
        (0..n)
            .map(|i| DatasetItem {
                item_id: format!("item-{i}"),
                content: serde_json::json!({ "rows": i }),
            })
            .collect()
    }

    #[test]
    fn anchor_is_deterministic_per_input() {
        let engine = FallbackEngine::new();
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), serde_json::json!("sensor"));
        let capsules: Vec<Commitment> = engine
            .seal_capsules(&items(3))
            .unwrap()
            .into_iter()
            .map(|c| c.content_commitment)
            .collect();

        let a = engine.anchor_dataset("ds-1", &metadata, &capsules).unwrap();
        let b = engine.anchor_dataset("ds-1", &metadata, &capsules).unwrap();
        assert_eq!(a.dataset_fingerprint, b.dataset_fingerprint);
        assert_eq!(a.merkle_root, b.merkle_root);
    }

    #[test]
    fn receipt_proof_verifies() {
        let engine = FallbackEngine::new();
        let input = serde_json::json!({"a": 1});
        let output = serde_json::json!({"b": 2});
        let payload = engine.issue_receipt("model-x", &input, &output).unwrap();

        assert_eq!(payload.cryptographic_proof.scheme, ProofScheme::Digest);
        let binding = ProofBinding {
            model_id: "model-x",
            input_hash: &payload.input_hash,
            output_hash: &payload.output_hash,
            timestamp: payload.timestamp,
        };
        assert!(verify_receipt_proof(&binding, &payload.cryptographic_proof).unwrap());
    }

    #[test]
    fn receipts_are_distinct_audit_events() {
        let engine = FallbackEngine::new();
        let input = serde_json::json!({"a": 1});
        let output = serde_json::json!({"b": 2});
        let one = engine.issue_receipt("m", &input, &output).unwrap();
        let two = engine.issue_receipt("m", &input, &output).unwrap();
        assert_ne!(one.receipt_id, two.receipt_id);
        // Same payloads still commit identically.
        assert_eq!(one.input_hash, two.input_hash);
        assert_eq!(one.output_hash, two.output_hash);
    }

    #[test]
    fn item_verification_round_trip() {
        let engine = FallbackEngine::new();
        let batch = items(5);
        let capsules = engine.seal_capsules(&batch).unwrap();
        let commitments: Vec<Commitment> =
            capsules.iter().map(|c| c.content_commitment.clone()).collect();
        let root = merkle_root(&commitments);

        assert!(engine
            .verify_item("item-2", &serde_json::json!({"rows": 2}), &capsules, &root)
            .unwrap());
        // Altered content fails.
        assert!(!engine
            .verify_item("item-2", &serde_json::json!({"rows": 99}), &capsules, &root)
            .unwrap());
        // Unknown item fails.
        assert!(!engine
            .verify_item("item-9", &serde_json::json!({"rows": 9}), &capsules, &root)
            .unwrap());
    }

    #[test]
    fn report_commitment_ignores_generation_time() {
        let engine = FallbackEngine::new();
        let anchors = vec![ReportAnchorInput {
            dataset_id: "ds-1".into(),
            mode: AssuranceMode::Mock,
        }];
        let receipts = vec![ReportReceiptInput {
            receipt_id: Uuid::new_v4(),
            verification_status: VerificationStatus::Verified,
            mode: AssuranceMode::Mock,
        }];
        let one = engine.generate_report(&anchors, &receipts).unwrap();
        let two = engine.generate_report(&anchors, &receipts).unwrap();
        assert_eq!(one.report_commitment, two.report_commitment);
        assert_ne!(one.report_id, two.report_id);
        assert_eq!(one.verified_receipts, 1);
        assert_eq!(one.total_anchors, 1);
    }
}
