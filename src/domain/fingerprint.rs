//! Content digests for quote inputs and results.
//!
//! Upstream consumers cache computed results and diff revisions by comparing
//! digests; identical values always serialize to identical bytes, so the
//! digest is stable across runs.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 (hex) of the JSON serialization of `value`.
///
/// # Errors
/// Returns an error if `value` cannot be serialized.
pub fn digest_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
