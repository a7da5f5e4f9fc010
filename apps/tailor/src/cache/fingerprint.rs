//! Stage fingerprints — deterministic digests over a stage's semantically
//! relevant inputs, used as cache keys.
//!
//! The digest covers the stage identifier, the generation model id, the
//! stage's prompt template version, and the serialized input payload.
//! Changing any of them (new model, reworded prompt, different upstream
//! output) yields a new fingerprint and therefore a fresh cache entry; old
//! entries are never invalidated in place.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase hex SHA-256 digest of a stage's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the fingerprint for one stage invocation. Pure: no I/O, no
/// clock. `inputs` must already be a `serde_json::Value` — object keys
/// serialize in sorted order, so semantically identical payloads hash
/// identically regardless of how they were assembled in memory.
pub fn fingerprint(stage: &str, model: &str, prompt_version: &str, inputs: &Value) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(stage.as_bytes());
    hasher.update([0u8]);
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(prompt_version.as_bytes());
    hasher.update([0u8]);
    // Value serialization is deterministic: serde_json's default Map is
    // BTreeMap-backed, so object keys come out sorted.
    hasher.update(inputs.to_string().as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}
