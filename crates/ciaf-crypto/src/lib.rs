//! # ciaf-crypto — Commitment Schemes for the Audit Core
//!
//! Implements the integrity machinery behind the artifact model:
//!
//! - [`merkle`] — domain-separated SHA-256 Merkle tree over provenance
//!   capsules, with inclusion proof generation and verification.
//! - [`proof`] — the pluggable receipt proof schemes: Ed25519 signatures
//!   for the engine path, digest bindings for the fallback path.
//!
//! ## Security Invariant
//!
//! All hashing flows through [`ciaf_core::Commitment`] values produced by
//! the canonical pipeline; this crate never hashes raw caller bytes.

pub mod merkle;
pub mod proof;

pub use merkle::{merkle_root, prove_inclusion, verify_inclusion, MerkleProof, PathStep, Side};
pub use proof::{issue_digest_proof, verify_receipt_proof, Ed25519ProofSigner};
