//! JobDescriptor — the structured job posting a run is tailored against.
//!
//! Loaded once per run from a JSON file and never mutated afterward.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// A single requirement extracted from the posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub text: String,
    pub is_required: bool,
}

/// Immutable description of the job posting being targeted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub company: String,
    pub title: String,
    pub raw_text: String,
    pub requirements: Vec<Requirement>,
}

impl JobDescriptor {
    /// Loads and validates a job descriptor. Any problem here is a
    /// configuration error: the run aborts before any stage executes.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("Cannot read job file {}: {e}", path.display()))
        })?;
        let job: JobDescriptor = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Configuration(format!("Invalid job file {}: {e}", path.display()))
        })?;
        if job.company.trim().is_empty() || job.title.trim().is_empty() {
            return Err(PipelineError::Configuration(format!(
                "Job file {} must set both company and title",
                path.display()
            )));
        }
        Ok(job)
    }
}
