//! RunDirectoryManager — versioned output locations, one per invocation.
//!
//! Layout: `<base>/<YYYY-MM-DD>/run_<HHMMSS>/...` plus a `latest` pointer
//! file under the date directory naming the most recent run. Two
//! allocations inside the same second are a programming/testing error, not
//! something we suffix around: the second `create_dir` fails.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use tempfile::NamedTempFile;
use tracing::info;

use crate::errors::PipelineError;
use crate::render::BackendKind;

const LATEST_POINTER: &str = "latest";

/// Immutable per-run context. Created once at run start by `allocate`;
/// everything downstream reads it, nothing mutates it.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// "YYYY-MM-DD/run_HHMMSS" — unique per invocation at second resolution.
    pub run_id: String,
    pub run_dir: PathBuf,
    pub date_dir: PathBuf,
    pub backend: BackendKind,
    pub cache_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RunDirectoryManager {
    base: PathBuf,
}

impl RunDirectoryManager {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Allocates the run directory for a new invocation using the wall
    /// clock. See `allocate_at` for the semantics.
    pub fn allocate(
        &self,
        backend: BackendKind,
        cache_enabled: bool,
    ) -> Result<RunContext, PipelineError> {
        self.allocate_at(Local::now().naive_local(), backend, cache_enabled)
    }

    /// Allocates `<base>/<date>/run_<time>/`. The run directory is created
    /// with `create_dir`, so a same-second collision surfaces as an error
    /// instead of being silently suffixed.
    pub fn allocate_at(
        &self,
        now: NaiveDateTime,
        backend: BackendKind,
        cache_enabled: bool,
    ) -> Result<RunContext, PipelineError> {
        let date = now.format("%Y-%m-%d").to_string();
        let run_name = format!("run_{}", now.format("%H%M%S"));

        let date_dir = self.base.join(&date);
        std::fs::create_dir_all(&date_dir).map_err(|e| {
            PipelineError::Configuration(format!(
                "Cannot create output directory {}: {e}",
                date_dir.display()
            ))
        })?;

        let run_dir = date_dir.join(&run_name);
        std::fs::create_dir(&run_dir).map_err(|e| {
            PipelineError::Configuration(format!(
                "Cannot allocate run directory {}: {e}",
                run_dir.display()
            ))
        })?;

        let run_id = format!("{date}/{run_name}");
        info!("Allocated run directory {}", run_dir.display());

        Ok(RunContext {
            run_id,
            run_dir,
            date_dir,
            backend,
            cache_enabled,
        })
    }

    /// Atomically replaces the date directory's `latest` pointer with this
    /// run's directory name. Called only after all artifacts are written, so
    /// a concurrent reader following the pointer never lands in a
    /// half-finished run.
    pub fn finalize(&self, ctx: &RunContext) -> Result<(), PipelineError> {
        let run_name = ctx
            .run_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PipelineError::Configuration(format!(
                    "Run directory {} has no valid name",
                    ctx.run_dir.display()
                ))
            })?;

        let pointer = ctx.date_dir.join(LATEST_POINTER);
        let mut tmp = NamedTempFile::new_in(&ctx.date_dir)
            .context("Failed to create temp file for latest pointer")?;
        writeln!(tmp, "{run_name}").context("Failed to write latest pointer")?;
        tmp.flush().context("Failed to flush latest pointer")?;
        // Replace, never patch: rename is atomic on the same filesystem.
        tmp.persist(&pointer)
            .with_context(|| format!("Failed to persist {}", pointer.display()))?;

        info!("Updated latest pointer -> {run_name}");
        Ok(())
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

/// Reads the run directory currently named by a date directory's `latest`
/// pointer, if any.
pub fn read_latest(date_dir: &Path) -> Option<PathBuf> {
    let raw = std::fs::read_to_string(date_dir.join(LATEST_POINTER)).ok()?;
    let name = raw.trim();
    if name.is_empty() {
        return None;
    }
    Some(date_dir.join(name))
}
