//! # Audit Service — Orchestration over Bridge and Fallback
//!
//! The single entry point for producing, retrieving, and verifying audit
//! artifacts. Each producing operation validates its inputs, attempts the
//! engine bridge when one is configured (and requested), and falls back to
//! the in-process engine on any bridge error — tagging the result with the
//! path that produced it. Creation is intentionally non-idempotent: every
//! call is a new audit event with a fresh id and timestamp.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use ciaf_bridge::protocol::{
    AnchorPayload, DatasetItem, ReceiptPayload, ReportAnchorInput, ReportPayload,
    ReportReceiptInput,
};
use ciaf_bridge::{BridgeError, EngineBridge};
use ciaf_core::artifact::validate_confidence;
use ciaf_core::{
    AssuranceMode, Commitment, DatasetAnchor, InferenceReceipt, ProofScheme, ProvenanceCapsule,
    ValidationError, VerificationResult, VerificationStatus,
};
use ciaf_crypto::verify_receipt_proof;

use crate::error::AuditError;
use crate::fallback::FallbackEngine;
use crate::store::{AnchorEntry, AnchorStore, OrderedStore};

/// Result of checking one item against its dataset's anchor.
#[derive(Debug, Clone, Serialize)]
pub struct ItemVerification {
    /// Dataset whose anchor was checked against.
    pub dataset_id: String,
    /// The item that was checked.
    pub item_id: String,
    /// Whether the item is included under the anchor's Merkle root.
    pub included: bool,
    /// Path that performed the check.
    pub mode: AssuranceMode,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
}

/// A committed summary of the artifact store.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    /// Report identifier.
    pub report_id: Uuid,
    /// Anchors summarized.
    pub total_anchors: usize,
    /// Receipts summarized.
    pub total_receipts: usize,
    /// Receipts whose last verification succeeded.
    pub verified_receipts: usize,
    /// Commitment over the report content.
    pub report_commitment: Commitment,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Path that generated the report.
    pub mode: AssuranceMode,
}

impl AuditReport {
    fn from_payload(payload: ReportPayload, mode: AssuranceMode) -> Self {
        Self {
            report_id: payload.report_id,
            total_anchors: payload.total_anchors,
            total_receipts: payload.total_receipts,
            verified_receipts: payload.verified_receipts,
            report_commitment: payload.report_commitment,
            generated_at: payload.generated_at,
            mode,
        }
    }
}

/// Orchestrating service owning the authoritative artifact stores.
///
/// The bridge is injected at construction — never a process-wide
/// singleton — so tests substitute a fake worker command.
#[derive(Debug)]
pub struct AuditService {
    bridge: Option<Arc<EngineBridge>>,
    fallback: FallbackEngine,
    anchors: AnchorStore,
    receipts: OrderedStore<Uuid, InferenceReceipt>,
}

impl AuditService {
    /// Service with no engine bridge; every operation runs in-process.
    pub fn new() -> Self {
        Self {
            bridge: None,
            fallback: FallbackEngine::new(),
            anchors: AnchorStore::new(),
            receipts: OrderedStore::new(),
        }
    }

    /// Service with an injected engine bridge.
    pub fn with_bridge(bridge: Arc<EngineBridge>) -> Self {
        Self { bridge: Some(bridge), ..Self::new() }
    }

    /// The injected bridge, if any.
    pub fn bridge(&self) -> Option<&Arc<EngineBridge>> {
        self.bridge.as_ref()
    }

    // ── Anchors ─────────────────────────────────────────────────────

    /// Create a dataset anchor.
    ///
    /// With `use_bridge`, the engine path is attempted first and any
    /// bridge error falls back in-process (result tagged `fallback`).
    /// Without it, the fallback engine runs directly (tagged `mock`).
    /// Re-anchoring an existing `dataset_id` appends a new anchor.
    pub async fn create_dataset_anchor(
        &self,
        dataset_id: &str,
        metadata: Map<String, Value>,
        items: Vec<DatasetItem>,
        use_bridge: bool,
    ) -> Result<DatasetAnchor, AuditError> {
        if dataset_id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "dataset_id" }.into());
        }
        ensure_canonical("metadata", &metadata)?;
        for item in &items {
            if item.item_id.trim().is_empty() {
                return Err(ValidationError::EmptyField { field: "items.item_id" }.into());
            }
            ensure_canonical("items.content", &item.content)?;
        }

        let mut bridge_failure: Option<BridgeError> = None;
        if use_bridge {
            let attempt = match self.bridge.as_deref() {
                Some(bridge) => {
                    Self::bridge_anchor(bridge, dataset_id, &items, &metadata).await
                }
                None => Err(BridgeError::NotConnected),
            };
            match attempt {
                Ok((payload, capsules)) => {
                    return Ok(self.store_anchor(
                        dataset_id,
                        metadata,
                        payload,
                        capsules,
                        AssuranceMode::Bridge,
                    ));
                }
                Err(err) => {
                    log_bridge_failure("createDatasetAnchor", &err);
                    bridge_failure = Some(err);
                }
            }
        }

        let mode = fallback_mode(&bridge_failure);
        let produced = self.fallback.seal_capsules(&items).and_then(|capsules| {
            let commitments: Vec<Commitment> =
                capsules.iter().map(|c| c.content_commitment.clone()).collect();
            self.fallback
                .anchor_dataset(dataset_id, &metadata, &commitments)
                .map(|payload| (payload, capsules))
        });
        match produced {
            Ok((payload, capsules)) => {
                Ok(self.store_anchor(dataset_id, metadata, payload, capsules, mode))
            }
            Err(fallback_err) => Err(unavailable(bridge_failure, fallback_err)),
        }
    }

    /// The most recent anchor for a dataset id.
    pub fn get_anchor(&self, dataset_id: &str) -> Result<DatasetAnchor, AuditError> {
        self.anchors
            .latest(dataset_id)
            .map(|entry| entry.anchor)
            .ok_or_else(|| AuditError::anchor_not_found(dataset_id))
    }

    /// Every anchor ever created, in creation order.
    pub fn list_anchors(&self) -> Vec<DatasetAnchor> {
        self.anchors.list()
    }

    // ── Receipts ────────────────────────────────────────────────────

    /// Issue an inference receipt.
    ///
    /// Uses the bridge when one is configured (tagged `bridge`, falling
    /// back on error), the fallback engine otherwise (tagged `mock`).
    pub async fn create_inference_receipt(
        &self,
        model_id: &str,
        input_data: Value,
        output_prediction: Value,
        confidence_score: f64,
        metadata: Map<String, Value>,
    ) -> Result<InferenceReceipt, AuditError> {
        if model_id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "model_id" }.into());
        }
        validate_confidence(confidence_score)?;
        ensure_canonical("input_data", &input_data)?;
        ensure_canonical("output_prediction", &output_prediction)?;
        ensure_canonical("metadata", &metadata)?;

        let mut bridge_failure: Option<BridgeError> = None;
        if let Some(bridge) = self.bridge.as_deref() {
            match Self::bridge_receipt(
                bridge,
                model_id,
                &input_data,
                &output_prediction,
                confidence_score,
            )
            .await
            {
                Ok(payload) => {
                    return Ok(self.store_receipt(
                        model_id,
                        confidence_score,
                        metadata,
                        payload,
                        AssuranceMode::Bridge,
                    ));
                }
                Err(err) => {
                    log_bridge_failure("createInferenceReceipt", &err);
                    bridge_failure = Some(err);
                }
            }
        }

        let mode = fallback_mode(&bridge_failure);
        match self.fallback.issue_receipt(model_id, &input_data, &output_prediction) {
            Ok(payload) => {
                Ok(self.store_receipt(model_id, confidence_score, metadata, payload, mode))
            }
            Err(fallback_err) => Err(unavailable(bridge_failure, fallback_err)),
        }
    }

    /// A receipt by id.
    pub fn get_receipt(&self, receipt_id: Uuid) -> Result<InferenceReceipt, AuditError> {
        self.receipts
            .get(&receipt_id)
            .ok_or_else(|| AuditError::receipt_not_found(receipt_id))
    }

    /// Every receipt, in creation order.
    pub fn list_receipts(&self) -> Vec<InferenceReceipt> {
        self.receipts.list()
    }

    /// Re-verify a receipt against its stored commitments.
    ///
    /// Local and pure: re-derives the proof binding from the stored
    /// artifact and checks the proof against it. Updates the receipt's
    /// `verification_status` by whole-artifact re-insert.
    pub fn verify_receipt(&self, receipt_id: Uuid) -> Result<VerificationResult, AuditError> {
        let receipt = self
            .receipts
            .get(&receipt_id)
            .ok_or_else(|| AuditError::receipt_not_found(receipt_id))?;

        // Structural consistency: confidence in range and the proof shape
        // matching its scheme.
        let integrity_check = validate_confidence(receipt.confidence_score).is_ok()
            && match receipt.cryptographic_proof.scheme {
                ProofScheme::Ed25519 => receipt.cryptographic_proof.verifying_key.is_some(),
                ProofScheme::Digest => receipt.cryptographic_proof.verifying_key.is_none(),
            };

        let cryptographic_verification =
            verify_receipt_proof(&receipt.binding(), &receipt.cryptographic_proof)
                .unwrap_or(false);

        let is_valid = integrity_check && cryptographic_verification;

        let mut updated = receipt;
        updated.verification_status =
            if is_valid { VerificationStatus::Verified } else { VerificationStatus::Invalid };
        self.receipts.insert(receipt_id, updated);

        Ok(VerificationResult {
            target_id: receipt_id.to_string(),
            is_valid,
            integrity_check,
            cryptographic_verification,
            verified_at: Utc::now(),
        })
    }

    // ── Item verification ───────────────────────────────────────────

    /// Check membership of an item in a dataset's latest anchor.
    pub async fn verify_dataset_item(
        &self,
        dataset_id: &str,
        item_id: &str,
        content: Value,
    ) -> Result<ItemVerification, AuditError> {
        let entry = self
            .anchors
            .latest(dataset_id)
            .ok_or_else(|| AuditError::anchor_not_found(dataset_id))?;
        ensure_canonical("content", &content)?;

        let mut bridge_failure: Option<BridgeError> = None;
        if let Some(bridge) = self.bridge.as_deref() {
            match Self::bridge_verify_item(bridge, item_id, &content, &entry).await {
                Ok(included) => {
                    return Ok(item_verification(
                        dataset_id,
                        item_id,
                        included,
                        AssuranceMode::Bridge,
                    ));
                }
                Err(err) => {
                    log_bridge_failure("verifyItem", &err);
                    bridge_failure = Some(err);
                }
            }
        }

        let mode = fallback_mode(&bridge_failure);
        match self.fallback.verify_item(
            item_id,
            &content,
            &entry.capsules,
            &entry.anchor.merkle_root,
        ) {
            Ok(included) => Ok(item_verification(dataset_id, item_id, included, mode)),
            Err(fallback_err) => Err(unavailable(bridge_failure, fallback_err)),
        }
    }

    // ── Reports ─────────────────────────────────────────────────────

    /// Summarize the artifact store into a committed report.
    pub async fn generate_report(&self) -> Result<AuditReport, AuditError> {
        let anchors: Vec<ReportAnchorInput> = self
            .anchors
            .list()
            .into_iter()
            .map(|a| ReportAnchorInput { dataset_id: a.dataset_id, mode: a.mode })
            .collect();
        let receipts: Vec<ReportReceiptInput> = self
            .receipts
            .list()
            .into_iter()
            .map(|r| ReportReceiptInput {
                receipt_id: r.receipt_id,
                verification_status: r.verification_status,
                mode: r.mode,
            })
            .collect();

        let mut bridge_failure: Option<BridgeError> = None;
        if let Some(bridge) = self.bridge.as_deref() {
            match Self::bridge_report(bridge, anchors.clone(), receipts.clone()).await {
                Ok(payload) => {
                    return Ok(AuditReport::from_payload(payload, AssuranceMode::Bridge));
                }
                Err(err) => {
                    log_bridge_failure("generateReport", &err);
                    bridge_failure = Some(err);
                }
            }
        }

        let mode = fallback_mode(&bridge_failure);
        match self.fallback.generate_report(&anchors, &receipts) {
            Ok(payload) => Ok(AuditReport::from_payload(payload, mode)),
            Err(fallback_err) => Err(unavailable(bridge_failure, fallback_err)),
        }
    }

    // ── Bridge paths ────────────────────────────────────────────────

    async fn bridge_anchor(
        bridge: &EngineBridge,
        dataset_id: &str,
        items: &[DatasetItem],
        metadata: &Map<String, Value>,
    ) -> Result<(AnchorPayload, Vec<ProvenanceCapsule>), BridgeError> {
        bridge.connect().await?;
        let capsules = bridge.create_provenance_capsules(dataset_id, items.to_vec()).await?;
        let commitments: Vec<Commitment> =
            capsules.iter().map(|c| c.content_commitment.clone()).collect();
        let payload =
            bridge.create_dataset_anchor(dataset_id, metadata.clone(), commitments).await?;
        Ok((payload, capsules))
    }

    async fn bridge_receipt(
        bridge: &EngineBridge,
        model_id: &str,
        input_data: &Value,
        output_prediction: &Value,
        confidence_score: f64,
    ) -> Result<ReceiptPayload, BridgeError> {
        bridge.connect().await?;
        bridge
            .create_inference_receipt(
                model_id,
                input_data.clone(),
                output_prediction.clone(),
                confidence_score,
            )
            .await
    }

    async fn bridge_verify_item(
        bridge: &EngineBridge,
        item_id: &str,
        content: &Value,
        entry: &AnchorEntry,
    ) -> Result<bool, BridgeError> {
        bridge.connect().await?;
        bridge
            .verify_item(
                item_id,
                content.clone(),
                entry.capsules.clone(),
                entry.anchor.merkle_root.clone(),
            )
            .await
    }

    async fn bridge_report(
        bridge: &EngineBridge,
        anchors: Vec<ReportAnchorInput>,
        receipts: Vec<ReportReceiptInput>,
    ) -> Result<ReportPayload, BridgeError> {
        bridge.connect().await?;
        bridge.generate_report(anchors, receipts).await
    }

    // ── Normalization into the artifact model ───────────────────────

    fn store_anchor(
        &self,
        dataset_id: &str,
        metadata: Map<String, Value>,
        payload: AnchorPayload,
        capsules: Vec<ProvenanceCapsule>,
        mode: AssuranceMode,
    ) -> DatasetAnchor {
        let anchor = DatasetAnchor {
            dataset_id: dataset_id.to_string(),
            dataset_fingerprint: payload.dataset_fingerprint,
            merkle_root: payload.merkle_root,
            metadata,
            created_at: payload.created_at,
            mode,
        };
        self.anchors.append(AnchorEntry { anchor: anchor.clone(), capsules });
        anchor
    }

    fn store_receipt(
        &self,
        model_id: &str,
        confidence_score: f64,
        metadata: Map<String, Value>,
        payload: ReceiptPayload,
        mode: AssuranceMode,
    ) -> InferenceReceipt {
        let receipt = InferenceReceipt {
            receipt_id: payload.receipt_id,
            model_id: model_id.to_string(),
            input_hash: payload.input_hash,
            output_hash: payload.output_hash,
            confidence_score,
            cryptographic_proof: payload.cryptographic_proof,
            verification_status: VerificationStatus::Unverified,
            timestamp: payload.timestamp,
            metadata,
            mode,
        };
        self.receipts.insert(receipt.receipt_id, receipt.clone());
        receipt
    }
}

impl Default for AuditService {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate that a value survives the canonical pipeline, naming the field
/// on failure. Runs before any production path, so canonicalization can
/// never surface as an availability error.
fn ensure_canonical(field: &'static str, value: &impl Serialize) -> Result<(), ValidationError> {
    ciaf_core::CanonicalBytes::new(value)
        .map(|_| ())
        .map_err(|e| ValidationError::Malformed { field, reason: e.to_string() })
}

fn fallback_mode(bridge_failure: &Option<BridgeError>) -> AssuranceMode {
    if bridge_failure.is_some() { AssuranceMode::Fallback } else { AssuranceMode::Mock }
}

fn unavailable(bridge_failure: Option<BridgeError>, fallback_err: impl ToString) -> AuditError {
    AuditError::Unavailable {
        bridge: bridge_failure
            .map(|e| e.to_string())
            .unwrap_or_else(|| "engine not requested".to_string()),
        fallback: fallback_err.to_string(),
    }
}

fn item_verification(
    dataset_id: &str,
    item_id: &str,
    included: bool,
    mode: AssuranceMode,
) -> ItemVerification {
    ItemVerification {
        dataset_id: dataset_id.to_string(),
        item_id: item_id.to_string(),
        included,
        mode,
        checked_at: Utc::now(),
    }
}

fn log_bridge_failure(operation: &'static str, err: &BridgeError) {
    if err.is_transient() {
        tracing::warn!(operation, error = %err, "bridge path failed, falling back");
    } else {
        tracing::error!(operation, error = %err, "bridge protocol failure, falling back");
    }
}
