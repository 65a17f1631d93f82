//! # Canonical Serialization — Deterministic Byte Production
//!
//! Defines [`CanonicalBytes`], the sole construction path for bytes used in
//! commitment computation across the audit core.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through [`CanonicalBytes::new()`], which rejects floats
//! and serializes with lexicographically sorted keys and compact separators.
//! Any function computing a commitment must accept `&CanonicalBytes`, so no
//! code path can hash non-canonical bytes.
//!
//! ## Rules
//!
//! 1. **Reject floats** — non-integer numbers have ambiguous shortest-form
//!    serializations; values crossing the commitment boundary use strings
//!    or integers.
//! 2. **Sort object keys** — lexicographic byte order, applied recursively.
//! 3. **Compact separators** — no whitespace anywhere in the output.
//! 4. **UTF-8 passthrough** — non-ASCII characters are not escaped.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by the canonicalization pipeline.
///
/// # Invariants
///
/// - The only constructor is [`CanonicalBytes::new()`].
/// - No float appears anywhere in the serialized value.
/// - Object keys are sorted; separators are compact.
///
/// The inner `Vec<u8>` is private, so downstream code cannot violate these
/// invariants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// This is the ONLY way to construct `CanonicalBytes`; all commitment
    /// computation in the workspace flows through it.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::FloatRejected`] if the value
    /// contains a non-integer number, or
    /// [`CanonicalizationError::SerializationFailed`] if the value cannot
    /// be represented as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let mut out = Vec::with_capacity(64);
        write_canonical(&value, &mut out)?;
        Ok(Self(out))
    }

    /// Access the canonical bytes for commitment computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Recursively serialize a JSON value in canonical form.
///
/// Keys are sorted explicitly rather than relying on the map backing of
/// `serde_json::Value`, so the output is stable regardless of which map
/// features other crates in the build graph enable.
fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                // Unrepresentable as an integer: reject.
                return Err(CanonicalizationError::FloatRejected(
                    n.as_f64().unwrap_or(f64::NAN),
                ));
            }
            out.extend_from_slice(n.to_string().as_bytes());
        }
        Value::String(s) => {
            let escaped = serde_json::to_string(s)?;
            out.extend_from_slice(escaped.as_bytes());
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                let escaped = serde_json::to_string(key)?;
                out.extend_from_slice(escaped.as_bytes());
                out.push(b':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}
