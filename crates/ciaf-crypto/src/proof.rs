//! # Receipt Proof Schemes
//!
//! Issues and verifies the `cryptographic_proof` carried by inference
//! receipts. Two schemes implement the same contract:
//!
//! - [`Ed25519ProofSigner`] — the engine path. An Ed25519 signature over
//!   the canonical proof binding; the verifying key travels inside the
//!   proof so stored receipts are self-verifying.
//! - [`issue_digest_proof`] — the fallback path. A bare commitment over
//!   the binding: tamper-evident for the stored record, but anyone who can
//!   rewrite the record can reissue it. The assurance gap between the two
//!   schemes is exactly what the artifact's `mode` tag surfaces.
//!
//! ## Security Invariant
//!
//! Both schemes operate on [`ProofBinding::to_canonical()`] output, never
//! on ad-hoc serializations, so proof verification and issuance can never
//! disagree about byte representation.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use ciaf_core::error::CryptoError;
use ciaf_core::{commit, ProofBinding, ProofScheme, ReceiptProof};

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, CryptoError> {
    if hex.len() % 2 != 0 {
        return Err(CryptoError::Commitment(format!(
            "odd-length hex string: {} chars",
            hex.len()
        )));
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair)
                .map_err(|e| CryptoError::Commitment(format!("invalid hex: {e}")))?;
            u8::from_str_radix(s, 16)
                .map_err(|e| CryptoError::Commitment(format!("invalid hex: {e}")))
        })
        .collect()
}

/// Ed25519 proof issuer for the engine path.
///
/// Holds the signing key for the worker's lifetime; the key is ephemeral
/// and zeroized on drop (dalek's `zeroize` integration).
pub struct Ed25519ProofSigner {
    signing_key: SigningKey,
}

impl std::fmt::Debug for Ed25519ProofSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519ProofSigner")
            .field("verifying_key", &hex_encode(self.signing_key.verifying_key().as_bytes()))
            .finish()
    }
}

impl Ed25519ProofSigner {
    /// Generate a fresh signer with an ephemeral key.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand_core::OsRng),
        }
    }

    /// Construct a signer from raw key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Hex form of the verifying key, as embedded in issued proofs.
    pub fn verifying_key_hex(&self) -> String {
        hex_encode(self.signing_key.verifying_key().as_bytes())
    }

    /// Issue a signed proof over the canonical binding.
    pub fn issue(&self, binding: &ProofBinding<'_>) -> Result<ReceiptProof, CryptoError> {
        let canonical = binding
            .to_canonical()
            .map_err(|e| CryptoError::ProofIssuance(e.to_string()))?;
        let signature = self.signing_key.sign(canonical.as_bytes());
        Ok(ReceiptProof {
            scheme: ProofScheme::Ed25519,
            proof: hex_encode(&signature.to_bytes()),
            verifying_key: Some(self.verifying_key_hex()),
        })
    }
}

/// Issue a digest-binding proof over the canonical binding (fallback path).
pub fn issue_digest_proof(binding: &ProofBinding<'_>) -> Result<ReceiptProof, CryptoError> {
    let canonical = binding
        .to_canonical()
        .map_err(|e| CryptoError::ProofIssuance(e.to_string()))?;
    Ok(ReceiptProof {
        scheme: ProofScheme::Digest,
        proof: commit(&canonical).to_hex(),
        verifying_key: None,
    })
}

/// Verify a proof against a re-derived binding.
///
/// Returns `Ok(false)` when the proof does not match the binding, and
/// `Err` only when the proof blob itself is unparseable (wrong-length
/// signature, missing verifying key, malformed hex).
pub fn verify_receipt_proof(
    binding: &ProofBinding<'_>,
    proof: &ReceiptProof,
) -> Result<bool, CryptoError> {
    let canonical = binding
        .to_canonical()
        .map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;
    match proof.scheme {
        ProofScheme::Digest => Ok(commit(&canonical).to_hex() == proof.proof),
        ProofScheme::Ed25519 => {
            let vk_hex = proof.verifying_key.as_deref().ok_or_else(|| {
                CryptoError::VerificationFailed(
                    "ed25519 proof is missing its verifying key".to_string(),
                )
            })?;
            let vk_bytes = hex_decode(vk_hex)?;
            let vk_arr: [u8; 32] = vk_bytes.as_slice().try_into().map_err(|_| {
                CryptoError::VerificationFailed(format!(
                    "verifying key must be 32 bytes, got {}",
                    vk_bytes.len()
                ))
            })?;
            let verifying_key = VerifyingKey::from_bytes(&vk_arr)
                .map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;
            let sig_bytes = hex_decode(&proof.proof)?;
            let signature = Signature::from_slice(&sig_bytes)
                .map_err(|e| CryptoError::VerificationFailed(e.to_string()))?;
            Ok(verifying_key.verify(canonical.as_bytes(), &signature).is_ok())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ciaf_core::artifact::payload_commitment;
    use ciaf_core::Commitment;

    fn binding_fixture(
        input: &Commitment,
        output: &Commitment,
    ) -> ProofBinding<'static> {
        // Leak is fine in tests; keeps the fixture signature simple.
        let model_id: &'static str = "model-42";
        ProofBinding {
            model_id,
            input_hash: Box::leak(Box::new(input.clone())),
            output_hash: Box::leak(Box::new(output.clone())),
            timestamp: Utc::now(),
        }
    }

    fn commitments() -> (Commitment, Commitment) {
        (
            payload_commitment(&serde_json::json!({"a": 1})).unwrap(),
            payload_commitment(&serde_json::json!({"b": 2})).unwrap(),
        )
    }

    #[test]
    fn ed25519_round_trip() {
        let signer = Ed25519ProofSigner::generate();
        let (input, output) = commitments();
        let binding = binding_fixture(&input, &output);
        let proof = signer.issue(&binding).unwrap();
        assert_eq!(proof.scheme, ProofScheme::Ed25519);
        assert!(proof.verifying_key.is_some());
        assert!(verify_receipt_proof(&binding, &proof).unwrap());
    }

    #[test]
    fn ed25519_detects_binding_change() {
        let signer = Ed25519ProofSigner::generate();
        let (input, output) = commitments();
        let binding = binding_fixture(&input, &output);
        let proof = signer.issue(&binding).unwrap();

        let altered_input = payload_commitment(&serde_json::json!({"a": 999})).unwrap();
        let altered = ProofBinding {
            input_hash: Box::leak(Box::new(altered_input)),
            ..binding
        };
        assert!(!verify_receipt_proof(&altered, &proof).unwrap());
    }

    #[test]
    fn digest_round_trip() {
        let (input, output) = commitments();
        let binding = binding_fixture(&input, &output);
        let proof = issue_digest_proof(&binding).unwrap();
        assert_eq!(proof.scheme, ProofScheme::Digest);
        assert!(proof.verifying_key.is_none());
        assert!(verify_receipt_proof(&binding, &proof).unwrap());
    }

    #[test]
    fn digest_detects_binding_change() {
        let (input, output) = commitments();
        let binding = binding_fixture(&input, &output);
        let proof = issue_digest_proof(&binding).unwrap();

        let altered = ProofBinding {
            model_id: "other-model",
            ..binding
        };
        assert!(!verify_receipt_proof(&altered, &proof).unwrap());
    }

    #[test]
    fn tampered_signature_fails() {
        let signer = Ed25519ProofSigner::generate();
        let (input, output) = commitments();
        let binding = binding_fixture(&input, &output);
        let mut proof = signer.issue(&binding).unwrap();
        // Flip one nibble of the signature.
        let mut chars: Vec<char> = proof.proof.chars().collect();
        chars[0] = if chars[0] == '0' { '1' } else { '0' };
        proof.proof = chars.into_iter().collect();
        assert!(!verify_receipt_proof(&binding, &proof).unwrap());
    }

    #[test]
    fn missing_verifying_key_is_an_error() {
        let signer = Ed25519ProofSigner::generate();
        let (input, output) = commitments();
        let binding = binding_fixture(&input, &output);
        let mut proof = signer.issue(&binding).unwrap();
        proof.verifying_key = None;
        assert!(verify_receipt_proof(&binding, &proof).is_err());
    }

    #[test]
    fn malformed_proof_blob_is_an_error() {
        let (input, output) = commitments();
        let binding = binding_fixture(&input, &output);
        let proof = ReceiptProof {
            scheme: ProofScheme::Ed25519,
            proof: "zz".repeat(64),
            verifying_key: Some("aa".repeat(32)),
        };
        assert!(verify_receipt_proof(&binding, &proof).is_err());
    }

    #[test]
    fn signer_from_bytes_is_deterministic() {
        let seed = [7u8; 32];
        let a = Ed25519ProofSigner::from_bytes(&seed);
        let b = Ed25519ProofSigner::from_bytes(&seed);
        assert_eq!(a.verifying_key_hex(), b.verifying_key_hex());
    }
}
