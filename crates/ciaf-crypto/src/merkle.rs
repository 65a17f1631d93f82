//! # Merkle Tree over Provenance Capsules
//!
//! Computes the `merkle_root` commitment carried by dataset anchors and
//! produces inclusion proofs for individual capsules, so membership of an
//! item can be shown later without re-disclosing the dataset.
//!
//! ## Algorithm
//!
//! Domain-separated SHA-256:
//! - Leaf: `SHA256(0x00 || capsule_commitment)`.
//! - Node: `SHA256(0x01 || left || right)`.
//! - Empty tree: `SHA256(0x02)` — anchors over zero capsules still carry a
//!   well-formed root.
//!
//! Levels with an odd node count carry the unpaired node up unchanged (no
//! duplication), so a proof path may be shorter than `ceil(log2(n))`.
//!
//! ## Verification Policy
//!
//! `verify_inclusion` returns `bool` and never errors: a malformed proof
//! is simply an invalid proof.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use ciaf_core::error::CryptoError;
use ciaf_core::{Commitment, CommitmentAlgorithm};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;
const EMPTY_PREFIX: u8 = 0x02;

fn sha256_raw(input: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(input);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

/// Leaf hash: `SHA256(0x00 || capsule_commitment)`.
fn leaf_hash(capsule: &Commitment) -> [u8; 32] {
    let mut input = Vec::with_capacity(33);
    input.push(LEAF_PREFIX);
    input.extend_from_slice(&capsule.bytes);
    sha256_raw(&input)
}

/// Parent node hash: `SHA256(0x01 || left || right)`.
fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut input = Vec::with_capacity(65);
    input.push(NODE_PREFIX);
    input.extend_from_slice(left);
    input.extend_from_slice(right);
    sha256_raw(&input)
}

/// Root of the empty tree.
fn empty_root() -> [u8; 32] {
    sha256_raw(&[EMPTY_PREFIX])
}

/// Which side a proof sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Sibling is the left child; the running hash is the right.
    Left,
    /// Sibling is the right child; the running hash is the left.
    Right,
}

/// One step in an inclusion proof path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    /// Side the sibling is on.
    pub side: Side,
    /// The sibling hash.
    pub hash: Commitment,
}

/// An inclusion proof for one capsule in an anchored dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Index of the proven leaf in the capsule batch.
    pub leaf_index: usize,
    /// Number of leaves in the batch the root was computed over.
    pub leaf_count: usize,
    /// Sibling path from the leaf to the root.
    pub path: Vec<PathStep>,
}

/// Compute the Merkle root over a batch of capsule commitments.
pub fn merkle_root(capsules: &[Commitment]) -> Commitment {
    if capsules.is_empty() {
        return Commitment::new(CommitmentAlgorithm::Sha256, empty_root());
    }
    let mut level: Vec<[u8; 32]> = capsules.iter().map(leaf_hash).collect();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [left, right] => next.push(node_hash(left, right)),
                // Unpaired node carries up unchanged.
                [single] => next.push(*single),
                _ => unreachable!("chunks(2) yields 1 or 2 elements"),
            }
        }
        level = next;
    }
    Commitment::new(CommitmentAlgorithm::Sha256, level[0])
}

/// Build an inclusion proof for the capsule at `leaf_index`.
///
/// # Errors
///
/// Returns `CryptoError::Commitment` if the batch is empty or the index is
/// out of range.
pub fn prove_inclusion(
    capsules: &[Commitment],
    leaf_index: usize,
) -> Result<MerkleProof, CryptoError> {
    if capsules.is_empty() {
        return Err(CryptoError::Commitment(
            "cannot prove inclusion in an empty batch".to_string(),
        ));
    }
    if leaf_index >= capsules.len() {
        return Err(CryptoError::Commitment(format!(
            "leaf_index {leaf_index} out of range for batch of {}",
            capsules.len()
        )));
    }

    let mut level: Vec<[u8; 32]> = capsules.iter().map(leaf_hash).collect();
    let mut pos = leaf_index;
    let mut path = Vec::new();

    while level.len() > 1 {
        let sibling_pos = pos ^ 1;
        if sibling_pos < level.len() {
            let side = if sibling_pos < pos { Side::Left } else { Side::Right };
            path.push(PathStep {
                side,
                hash: Commitment::new(CommitmentAlgorithm::Sha256, level[sibling_pos]),
            });
        }
        // else: unpaired node, carried up without a sibling step.

        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [left, right] => next.push(node_hash(left, right)),
                [single] => next.push(*single),
                _ => unreachable!("chunks(2) yields 1 or 2 elements"),
            }
        }
        level = next;
        pos /= 2;
    }

    Ok(MerkleProof {
        leaf_index,
        leaf_count: capsules.len(),
        path,
    })
}

/// Verify that `capsule` is included under `root` according to `proof`.
pub fn verify_inclusion(root: &Commitment, capsule: &Commitment, proof: &MerkleProof) -> bool {
    if proof.leaf_count == 0 || proof.leaf_index >= proof.leaf_count {
        return false;
    }
    let mut current = leaf_hash(capsule);
    for step in &proof.path {
        current = match step.side {
            Side::Left => node_hash(&step.hash.bytes, &current),
            Side::Right => node_hash(&current, &step.hash.bytes),
        };
    }
    current == root.bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciaf_core::{commit, CanonicalBytes};

    /// Capsule commitment fixture: commit over `{"item": i}`.
    fn c(i: usize) -> Commitment {
        commit(&CanonicalBytes::new(&serde_json::json!({ "item": i })).unwrap())
    }

    #[test]
    fn empty_batch_has_stable_root() {
        let a = merkle_root(&[]);
        let b = merkle_root(&[]);
        assert_eq!(a, b);
        // Distinct from any single-leaf root.
        assert_ne!(a, merkle_root(&[c(0)]));
    }

    #[test]
    fn root_is_deterministic() {
        let caps: Vec<_> = (0..5).map(c).collect();
        assert_eq!(merkle_root(&caps), merkle_root(&caps));
    }

    #[test]
    fn root_sensitive_to_any_leaf() {
        let caps: Vec<_> = (0..8).map(c).collect();
        let root = merkle_root(&caps);
        for i in 0..8 {
            let mut altered = caps.clone();
            altered[i] = c(100 + i);
            assert_ne!(merkle_root(&altered), root, "leaf {i} change undetected");
        }
    }

    #[test]
    fn root_sensitive_to_leaf_order() {
        let caps: Vec<_> = (0..4).map(c).collect();
        let mut swapped = caps.clone();
        swapped.swap(1, 2);
        assert_ne!(merkle_root(&caps), merkle_root(&swapped));
    }

    #[test]
    fn single_leaf_proof_is_empty_path() {
        let caps = vec![c(0)];
        let proof = prove_inclusion(&caps, 0).unwrap();
        assert!(proof.path.is_empty());
        assert!(verify_inclusion(&merkle_root(&caps), &caps[0], &proof));
    }

    #[test]
    fn proofs_verify_for_all_indices_and_sizes() {
        for size in [1, 2, 3, 4, 5, 7, 8, 9, 15, 16, 17, 33] {
            let caps: Vec<_> = (0..size).map(c).collect();
            let root = merkle_root(&caps);
            for idx in 0..size {
                let proof = prove_inclusion(&caps, idx).unwrap();
                assert!(
                    verify_inclusion(&root, &caps[idx], &proof),
                    "proof failed at size={size}, idx={idx}"
                );
            }
        }
    }

    #[test]
    fn tampered_sibling_fails() {
        let caps: Vec<_> = (0..9).map(c).collect();
        let root = merkle_root(&caps);
        let proof = prove_inclusion(&caps, 3).unwrap();
        assert!(verify_inclusion(&root, &caps[3], &proof));

        let mut tampered = proof.clone();
        tampered.path[0].hash = c(999);
        assert!(!verify_inclusion(&root, &caps[3], &tampered));
    }

    #[test]
    fn wrong_leaf_fails() {
        let caps: Vec<_> = (0..6).map(c).collect();
        let root = merkle_root(&caps);
        let proof = prove_inclusion(&caps, 2).unwrap();
        assert!(!verify_inclusion(&root, &c(999), &proof));
    }

    #[test]
    fn wrong_root_fails() {
        let caps: Vec<_> = (0..6).map(c).collect();
        let proof = prove_inclusion(&caps, 2).unwrap();
        let other_root = merkle_root(&[c(50), c(51)]);
        assert!(!verify_inclusion(&other_root, &caps[2], &proof));
    }

    #[test]
    fn out_of_range_rejected() {
        let caps: Vec<_> = (0..5).map(c).collect();
        assert!(prove_inclusion(&caps, 5).is_err());
        assert!(prove_inclusion(&caps, 100).is_err());
        assert!(prove_inclusion(&[], 0).is_err());
    }

    #[test]
    fn degenerate_proof_metadata_rejected() {
        let caps: Vec<_> = (0..4).map(c).collect();
        let root = merkle_root(&caps);
        let mut proof = prove_inclusion(&caps, 1).unwrap();
        proof.leaf_count = 0;
        assert!(!verify_inclusion(&root, &caps[1], &proof));
    }

    #[test]
    fn proof_serde_round_trip() {
        let caps: Vec<_> = (0..7).map(c).collect();
        let proof = prove_inclusion(&caps, 4).unwrap();
        let json = serde_json::to_string(&proof).unwrap();
        let back: MerkleProof = serde_json::from_str(&json).unwrap();
        assert_eq!(back, proof);
        assert!(verify_inclusion(&merkle_root(&caps), &caps[4], &back));
    }
}
