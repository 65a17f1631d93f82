//! # Commitments — Content-Derived Identifiers
//!
//! Defines [`Commitment`] and [`CommitmentAlgorithm`], the tamper-evident
//! stand-ins for sensitive content throughout the audit core: dataset
//! fingerprints, capsule contents, inference inputs and outputs.
//!
//! ## Security Invariant
//!
//! A `Commitment` can only be computed from [`CanonicalBytes`], ensuring
//! every commitment in the system is produced through the canonicalization
//! pipeline. This is enforced by the signature of [`commit()`].
//!
//! ## Pluggability
//!
//! The algorithm tag travels with every commitment. Introducing a new
//! scheme is a new enum variant plus a computation arm — stored artifacts
//! remain self-describing and verifiable.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::CryptoError;

/// The hash algorithm used to produce a commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitmentAlgorithm {
    /// SHA-256 — the current commitment primitive.
    Sha256,
}

impl CommitmentAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Parse an algorithm identifier.
    pub fn parse(s: &str) -> Result<Self, CryptoError> {
        match s {
            "sha256" => Ok(Self::Sha256),
            other => Err(CryptoError::Commitment(format!(
                "unknown commitment algorithm: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for CommitmentAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A commitment with its algorithm tag.
///
/// Serializes as the self-describing string form `"sha256:<64 hex chars>"`,
/// which is what crosses the wire to the engine worker and appears in API
/// responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Commitment {
    /// The algorithm that produced this commitment.
    pub algorithm: CommitmentAlgorithm,
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl Commitment {
    /// Create a commitment from raw bytes and an algorithm tag.
    ///
    /// Prefer [`commit()`] for computing commitments from content.
    pub fn new(algorithm: CommitmentAlgorithm, bytes: [u8; 32]) -> Self {
        Self { algorithm, bytes }
    }

    /// Render the digest as a lowercase hex string (no algorithm prefix).
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse the self-describing string form `"<algorithm>:<64 hex chars>"`.
    pub fn parse(s: &str) -> Result<Self, CryptoError> {
        let (alg, hex) = s.split_once(':').ok_or_else(|| {
            CryptoError::Commitment(format!("expected <algorithm>:<hex>, got {s:?}"))
        })?;
        let algorithm = CommitmentAlgorithm::parse(alg)?;
        if hex.len() != 64 {
            return Err(CryptoError::Commitment(format!(
                "expected 64 hex chars, got {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk)
                .map_err(|e| CryptoError::Commitment(format!("invalid hex: {e}")))?;
            bytes[i] = u8::from_str_radix(pair, 16)
                .map_err(|e| CryptoError::Commitment(format!("invalid hex at byte {i}: {e}")))?;
        }
        Ok(Self { algorithm, bytes })
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl std::str::FromStr for Commitment {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

/// Compute a SHA-256 commitment from canonical bytes.
///
/// The signature accepts only `&CanonicalBytes`, not raw `&[u8]`, so no
/// code path can commit to non-canonical content.
pub fn commit(data: &CanonicalBytes) -> Commitment {
    let hash = Sha256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    Commitment::new(CommitmentAlgorithm::Sha256, bytes)
}

/// Compute a commitment and render it as bare hex.
///
/// Convenience for contexts that need the digest without the algorithm
/// prefix (Merkle leaf input, log lines).
pub fn commit_hex(data: &CanonicalBytes) -> String {
    commit(data).to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_is_deterministic() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(commit(&cb), commit(&cb));
        assert_eq!(commit(&cb).algorithm, CommitmentAlgorithm::Sha256);
    }

    #[test]
    fn different_inputs_differ() {
        let a = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        let b = CanonicalBytes::new(&serde_json::json!({"a": 2})).unwrap();
        assert_ne!(commit(&a), commit(&b));
    }

    #[test]
    fn known_sha256_vector() {
        // SHA-256 of the empty JSON object "{}".
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(cb.as_bytes(), b"{}");
        assert_eq!(
            commit_hex(&cb),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn display_and_parse_round_trip() {
        let cb = CanonicalBytes::new(&serde_json::json!({"k": "v"})).unwrap();
        let c = commit(&cb);
        let s = c.to_string();
        assert!(s.starts_with("sha256:"));
        assert_eq!(s.len(), 7 + 64);
        assert_eq!(Commitment::parse(&s).unwrap(), c);
    }

    #[test]
    fn serde_round_trip() {
        let cb = CanonicalBytes::new(&serde_json::json!({"k": "v"})).unwrap();
        let c = commit(&cb);
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("sha256:"));
        let back: Commitment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Commitment::parse("no-separator").is_err());
        assert!(Commitment::parse("md5:abcd").is_err());
        assert!(Commitment::parse("sha256:tooshort").is_err());
        assert!(Commitment::parse(&format!("sha256:{}", "zz".repeat(32))).is_err());
    }
}
