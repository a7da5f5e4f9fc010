//! CacheStore — durable stage outputs keyed by fingerprint.
//!
//! One JSON file per (stage, fingerprint) under
//! `<root>/<stage>/<fingerprint>.json`. Entries are content-addressed and
//! append-only: a changed input produces a new fingerprint and a new file,
//! never an in-place rewrite. The store does not evict — pruning is an
//! operator concern.
//!
//! Concurrent runs may race on `put`: writes go to a temp file in the same
//! directory and are renamed into place with no-clobber semantics, so the
//! first writer wins and a later writer's differing value is discarded.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::cache::fingerprint::Fingerprint;

/// The persisted envelope around one cached stage output. Written pretty-
/// printed so entries can be inspected by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub stage: String,
    pub output: Value,
    pub created_at: DateTime<Utc>,
}

/// Filesystem-backed cache of stage outputs.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, stage: &str, fp: &Fingerprint) -> PathBuf {
        self.root.join(stage).join(format!("{}.json", fp))
    }

    /// Exact-match lookup. A missing file is a miss; an unreadable or
    /// corrupt entry is logged and treated as a miss rather than failing
    /// the run.
    pub fn get(&self, stage: &str, fp: &Fingerprint) -> Option<Value> {
        let path = self.entry_path(stage, fp);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cache entry {} unreadable: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => {
                debug!("Cache hit for stage '{stage}' ({fp})");
                Some(entry.output)
            }
            Err(e) => {
                warn!("Cache entry {} corrupt, ignoring: {e}", path.display());
                None
            }
        }
    }

    /// Stores a stage output under its fingerprint. If an entry already
    /// exists the call is a no-op and the original value is retained —
    /// first-writer-wins preserves determinism across concurrent runs.
    pub fn put(&self, stage: &str, fp: &Fingerprint, output: &Value) -> Result<()> {
        let path = self.entry_path(stage, fp);
        if path.exists() {
            debug!("Cache entry for '{stage}' ({fp}) already present, keeping original");
            return Ok(());
        }

        let dir = path
            .parent()
            .context("cache entry path has no parent directory")?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;

        let entry = CacheEntry {
            fingerprint: fp.as_str().to_string(),
            stage: stage.to_string(),
            output: output.clone(),
            created_at: Utc::now(),
        };

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, &entry)
            .with_context(|| format!("Failed to serialize cache entry for stage '{stage}'"))?;
        tmp.flush().context("Failed to flush cache entry")?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!("Cache entry written for stage '{stage}' ({fp})");
                Ok(())
            }
            // A concurrent run got there first — their value stands.
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("Lost cache write race for '{stage}' ({fp}), keeping first writer's entry");
                Ok(())
            }
            Err(e) => Err(e.error).with_context(|| {
                format!("Failed to persist cache entry {}", path.display())
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fingerprint::fingerprint;
    use serde_json::json;

    #[test]
    fn test_get_on_empty_store_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let fp = fingerprint("job-analysis", "m", "v1", &json!({"a": 1}));
        assert!(store.get("job-analysis", &fp).is_none());
    }

    #[test]
    fn test_put_then_get_round_trips_output() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let fp = fingerprint("job-analysis", "m", "v1", &json!({"a": 1}));
        let output = json!({"summary": "looks good"});

        store.put("job-analysis", &fp, &output).unwrap();
        assert_eq!(store.get("job-analysis", &fp), Some(output));
    }

    #[test]
    fn test_put_is_first_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let fp = fingerprint("draft-generation", "m", "v1", &json!({"a": 1}));

        store.put("draft-generation", &fp, &json!({"v": "first"})).unwrap();
        store.put("draft-generation", &fp, &json!({"v": "second"})).unwrap();

        assert_eq!(
            store.get("draft-generation", &fp),
            Some(json!({"v": "first"}))
        );
    }

    #[test]
    fn test_entries_survive_store_reconstruction() {
        // Durability across process restarts: a fresh CacheStore over the
        // same root sees entries written by a previous one.
        let dir = tempfile::tempdir().unwrap();
        let fp = fingerprint("job-analysis", "m", "v1", &json!({"a": 1}));
        {
            let store = CacheStore::new(dir.path());
            store.put("job-analysis", &fp, &json!({"x": 42})).unwrap();
        }
        let store = CacheStore::new(dir.path());
        assert_eq!(store.get("job-analysis", &fp), Some(json!({"x": 42})));
    }

    #[test]
    fn test_lookup_is_exact_match_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let fp_a = fingerprint("job-analysis", "m", "v1", &json!({"a": 1}));
        let fp_b = fingerprint("job-analysis", "m", "v1", &json!({"a": 2}));

        store.put("job-analysis", &fp_a, &json!({"x": 1})).unwrap();
        assert!(store.get("job-analysis", &fp_b).is_none());
        // Same fingerprint under a different stage is also a miss.
        assert!(store.get("draft-generation", &fp_a).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_treated_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let fp = fingerprint("job-analysis", "m", "v1", &json!({"a": 1}));

        let stage_dir = dir.path().join("job-analysis");
        std::fs::create_dir_all(&stage_dir).unwrap();
        std::fs::write(stage_dir.join(format!("{fp}.json")), "not json").unwrap();

        assert!(store.get("job-analysis", &fp).is_none());
    }

    #[test]
    fn test_entry_file_is_inspectable_json_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let fp = fingerprint("job-analysis", "m", "v1", &json!({"a": 1}));
        store.put("job-analysis", &fp, &json!({"x": 1})).unwrap();

        let raw = std::fs::read_to_string(
            dir.path().join("job-analysis").join(format!("{fp}.json")),
        )
        .unwrap();
        let entry: CacheEntry = serde_json::from_str(&raw).unwrap();
        assert_eq!(entry.stage, "job-analysis");
        assert_eq!(entry.fingerprint, fp.as_str());
        assert_eq!(entry.output, json!({"x": 1}));
    }
}
