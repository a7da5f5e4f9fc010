//! CheckpointWriter — durable per-stage artifacts under the run directory.
//!
//! Checkpoints are independent of the cache: they live with the run, make a
//! crashed run resumable, and stay on disk for postmortem inspection when a
//! later stage aborts. A checkpoint only counts once fully and atomically
//! written — a torn or unparseable file is treated as absent.
//!
//! Each checkpoint records the fingerprint of the inputs it was produced
//! from. On restart a checkpoint is only adopted when that fingerprint
//! matches the restarted run's own; a checkpoint from a run with different
//! inputs is ignored and the stage regenerated.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::cache::fingerprint::Fingerprint;

const CHECKPOINT_DIR: &str = "checkpoints";

/// The persisted envelope around one stage checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub fingerprint: String,
    pub stage: String,
    pub output: Value,
}

/// Writes one JSON file per completed stage under
/// `<run_dir>/checkpoints/<stage>.json`.
#[derive(Debug)]
pub struct CheckpointWriter {
    dir: PathBuf,
}

impl CheckpointWriter {
    pub fn new(run_dir: &Path) -> Result<Self> {
        let dir = run_dir.join(CHECKPOINT_DIR);
        std::fs::create_dir_all(&dir).with_context(|| {
            format!("Failed to create checkpoint directory {}", dir.display())
        })?;
        Ok(Self { dir })
    }

    /// Durably persists a stage output together with the fingerprint of
    /// the inputs it came from. Overwriting within the same run is fine (a
    /// re-executed stage rewrites its own checkpoint); the write is still
    /// temp-file-then-rename so readers never see a partial file.
    pub fn write(&self, stage: &str, fp: &Fingerprint, output: &Value) -> Result<()> {
        let path = self.dir.join(format!("{stage}.json"));
        let entry = CheckpointEntry {
            fingerprint: fp.as_str().to_string(),
            stage: stage.to_string(),
            output: output.clone(),
        };
        write_json_atomic(&path, &entry)?;
        debug!("Checkpoint written for stage '{stage}'");
        Ok(())
    }

    /// Loads a stage checkpoint from a (possibly different) run directory.
    /// Returns None for missing, unreadable, or partially written files —
    /// an invalid checkpoint must never be adopted on restart. The caller
    /// checks the entry's fingerprint against its own before adopting.
    pub fn load(run_dir: &Path, stage: &str) -> Option<CheckpointEntry> {
        let path = run_dir.join(CHECKPOINT_DIR).join(format!("{stage}.json"));
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Checkpoint {} unreadable: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_str::<CheckpointEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Checkpoint {} invalid, ignoring: {e}", path.display());
                None
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Serializes `value` to `path` via a temp file in the same directory and
/// an atomic rename. Shared by checkpoints, the final resume document, and
/// the `latest` pointer.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .context("target path has no parent directory")?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    tmp.flush().context("Failed to flush temp file")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to persist {}", path.display()))?;
    Ok(())
}
