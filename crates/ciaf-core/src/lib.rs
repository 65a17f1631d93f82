//! # ciaf-core — Artifact Model for the CIAF Audit Core
//!
//! Defines the nouns every other component manipulates — dataset anchors,
//! provenance capsules, inference receipts, verification results — together
//! with the two pure building blocks all integrity claims funnel through:
//! canonical byte production ([`CanonicalBytes`]) and commitment computation
//! ([`commit()`]).
//!
//! ## Trust Boundary
//!
//! Every commitment in the system is produced from `CanonicalBytes` through
//! [`commit()`]. The commitment scheme is carried as an algorithm tag on
//! [`Commitment`], so swapping the primitive never touches callers.
//!
//! ## Crate Policy
//!
//! - Pure data and pure functions. No I/O, no clocks beyond accepting
//!   caller-supplied timestamps, no async.
//! - Sits at the bottom of the dependency DAG — depends on no other
//!   workspace crate.

pub mod artifact;
pub mod canonical;
pub mod commitment;
pub mod error;

pub use artifact::{
    dataset_fingerprint, AssuranceMode, DatasetAnchor, InferenceReceipt, ProofBinding,
    ProofScheme, ProvenanceCapsule, ReceiptProof, VerificationResult, VerificationStatus,
};
pub use canonical::CanonicalBytes;
pub use commitment::{commit, commit_hex, Commitment, CommitmentAlgorithm};
pub use error::{CanonicalizationError, CryptoError, ValidationError};
