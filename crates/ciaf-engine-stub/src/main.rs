//! Engine worker stub — standalone cryptographic engine process.
//!
//! Speaks the bridge wire protocol on stdin/stdout: one JSON request per
//! line in, one JSON response per line out, in request order, echoing each
//! request's id. Implements every operation with the real commitment
//! primitives, so artifacts it produces are indistinguishable in
//! derivation from the fallback engine's — the difference is the Ed25519
//! receipt proofs signed with this process's key.
//!
//! The signing key is ephemeral per run unless `CIAF_STUB_SEED` (64 hex
//! chars) pins it for reproducible deployments.
//!
//! Diagnostics go to stderr; stdout carries protocol frames only.

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ciaf_bridge::protocol::{
    AnchorPayload, CapsulesPayload, EngineOperation, ReceiptPayload, ReportAnchorInput,
    ReportPayload, ReportReceiptInput, RequestFrame, ResponseFrame, VerifyItemPayload,
};
use ciaf_core::artifact::{payload_commitment, validate_confidence};
use ciaf_core::{
    commit, dataset_fingerprint, CanonicalBytes, Commitment, ProofBinding, ProvenanceCapsule,
    VerificationStatus,
};
use ciaf_crypto::{merkle_root, prove_inclusion, verify_inclusion, Ed25519ProofSigner};

/// The stub engine: a signer plus pure handlers.
struct Engine {
    signer: Ed25519ProofSigner,
}

impl Engine {
    fn from_env() -> Self {
        let signer = match std::env::var("CIAF_STUB_SEED") {
            Ok(seed_hex) => match decode_seed(&seed_hex) {
                Some(seed) => Ed25519ProofSigner::from_bytes(&seed),
                None => {
                    tracing::warn!("CIAF_STUB_SEED is not 64 hex chars; using ephemeral key");
                    Ed25519ProofSigner::generate()
                }
            },
            Err(_) => Ed25519ProofSigner::generate(),
        };
        Self { signer }
    }

    /// Execute one operation, returning the response body fields.
    fn handle(&self, operation: EngineOperation) -> Result<Value, String> {
        match operation {
            EngineOperation::CreateProvenanceCapsules { dataset_id: _, items } => {
                let capsules = items
                    .into_iter()
                    .map(|item| ProvenanceCapsule::seal(item.item_id, &item.content))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| e.to_string())?;
                to_body(&CapsulesPayload { capsules })
            }
            EngineOperation::CreateDatasetAnchor { dataset_id, metadata, capsules } => {
                let payload = AnchorPayload {
                    dataset_fingerprint: dataset_fingerprint(&dataset_id, &metadata)
                        .map_err(|e| e.to_string())?,
                    merkle_root: merkle_root(&capsules),
                    created_at: Utc::now(),
                };
                to_body(&payload)
            }
            EngineOperation::CreateInferenceReceipt {
                model_id,
                input_data,
                output_prediction,
                confidence_score,
            } => {
                validate_confidence(confidence_score).map_err(|e| e.to_string())?;
                let input_hash = payload_commitment(&input_data).map_err(|e| e.to_string())?;
                let output_hash =
                    payload_commitment(&output_prediction).map_err(|e| e.to_string())?;
                let timestamp = Utc::now();
                let binding = ProofBinding {
                    model_id: &model_id,
                    input_hash: &input_hash,
                    output_hash: &output_hash,
                    timestamp,
                };
                let cryptographic_proof =
                    self.signer.issue(&binding).map_err(|e| e.to_string())?;
                to_body(&ReceiptPayload {
                    receipt_id: Uuid::new_v4(),
                    input_hash,
                    output_hash,
                    cryptographic_proof,
                    timestamp,
                })
            }
            EngineOperation::VerifyItem { item_id, content, capsules, merkle_root: root } => {
                let is_valid = check_membership(&item_id, &content, &capsules, &root)?;
                to_body(&VerifyItemPayload { is_valid })
            }
            EngineOperation::GenerateReport { anchors, receipts } => {
                to_body(&build_report(&anchors, &receipts)?)
            }
        }
    }
}

fn to_body(payload: &impl serde::Serialize) -> Result<Value, String> {
    serde_json::to_value(payload).map_err(|e| e.to_string())
}

fn decode_seed(hex: &str) -> Option<[u8; 32]> {
    if hex.len() != 64 {
        return None;
    }
    let mut seed = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).ok()?;
        seed[i] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(seed)
}

/// Membership check mirroring the audit-side verifier: the item must sit
/// in the batch under its id with a matching commitment, and its inclusion
/// must verify against the root.
fn check_membership(
    item_id: &str,
    content: &Value,
    capsules: &[ProvenanceCapsule],
    root: &Commitment,
) -> Result<bool, String> {
    let resealed = ProvenanceCapsule::seal(item_id, content).map_err(|e| e.to_string())?;
    let Some(index) = capsules.iter().position(|c| c.item_id == item_id) else {
        return Ok(false);
    };
    if capsules[index].content_commitment != resealed.content_commitment {
        return Ok(false);
    }
    let batch: Vec<Commitment> = capsules.iter().map(|c| c.content_commitment.clone()).collect();
    Ok(prove_inclusion(&batch, index)
        .map(|proof| verify_inclusion(root, &batch[index], &proof))
        .unwrap_or(false))
}

/// Report derivation shared with the fallback engine by construction: the
/// commitment covers summaries and totals, not the generation time.
fn build_report(
    anchors: &[ReportAnchorInput],
    receipts: &[ReportReceiptInput],
) -> Result<ReportPayload, String> {
    let verified = receipts
        .iter()
        .filter(|r| r.verification_status == VerificationStatus::Verified)
        .count();
    let content = CanonicalBytes::new(&serde_json::json!({
        "anchors": anchors,
        "receipts": receipts,
        "total_anchors": anchors.len(),
        "total_receipts": receipts.len(),
        "verified_receipts": verified,
    }))
    .map_err(|e| e.to_string())?;
    Ok(ReportPayload {
        report_id: Uuid::new_v4(),
        total_anchors: anchors.len(),
        total_receipts: receipts.len(),
        verified_receipts: verified,
        report_commitment: commit(&content),
        generated_at: Utc::now(),
    })
}

fn respond(id: u64, result: Result<Value, String>) -> ResponseFrame {
    match result {
        Ok(Value::Object(body)) => ResponseFrame { id, success: true, error: None, body },
        Ok(other) => ResponseFrame {
            id,
            success: false,
            error: Some(format!("payload serialized to non-object: {other}")),
            body: Map::new(),
        },
        Err(message) => {
            ResponseFrame { id, success: false, error: Some(message), body: Map::new() }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let engine = Engine::from_env();
    tracing::info!(verifying_key = %engine.signer.verifying_key_hex(), "engine stub ready");

    let mut lines = BufReader::new(stdin()).lines();
    let mut out = stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let frame = match serde_json::from_str::<RequestFrame>(line) {
            Ok(request) => {
                let id = request.id;
                respond(id, engine.handle(request.operation))
            }
            Err(error) => {
                tracing::warn!(%error, "malformed request line");
                ResponseFrame {
                    id: 0,
                    success: false,
                    error: Some(format!("malformed request: {error}")),
                    body: Map::new(),
                }
            }
        };
        let mut encoded = serde_json::to_string(&frame)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        encoded.push('\n');
        out.write_all(encoded.as_bytes()).await?;
        out.flush().await?;
    }

    Ok(())
}
