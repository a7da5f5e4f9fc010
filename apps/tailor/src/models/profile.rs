//! CareerProfile — the candidate's achievements, skills, and history.
//!
//! Loaded once per run from a JSON file and never mutated afterward.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// One concrete, evidenced accomplishment. Stage 2 matches these against
/// the job's requirements; only matched achievements reach the resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub title: String,
    pub description: String,
    pub skills: Vec<String>,
    #[serde(default)]
    pub impact: Option<String>,
}

/// A named skill grouping, e.g. "Languages" or "Infrastructure".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillGroup {
    pub name: String,
    pub skills: Vec<String>,
}

/// One employment entry in the candidate's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub company: String,
    pub title: String,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

/// Immutable record of the candidate's career.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareerProfile {
    pub name: String,
    pub headline: String,
    pub achievements: Vec<Achievement>,
    pub skills: Vec<SkillGroup>,
    #[serde(default)]
    pub history: Vec<Position>,
}

impl CareerProfile {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "Cannot read profile file {}: {e}",
                path.display()
            ))
        })?;
        let profile: CareerProfile = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Configuration(format!("Invalid profile file {}: {e}", path.display()))
        })?;
        if profile.achievements.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "Profile file {} has no achievements — nothing to match against the job",
                path.display()
            )));
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_profile_without_achievements_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(
            br#"{"name": "Sam", "headline": "Engineer", "achievements": [], "skills": []}"#,
        )
        .unwrap();
        let err = CareerProfile::load(f.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_history_and_impact_are_optional() {
        let json = r#"{
            "name": "Sam",
            "headline": "Engineer",
            "achievements": [
                {"title": "Cut latency", "description": "Rewrote the cache", "skills": ["Rust"]}
            ],
            "skills": [{"name": "Languages", "skills": ["Rust"]}]
        }"#;
        let profile: CareerProfile = serde_json::from_str(json).unwrap();
        assert!(profile.history.is_empty());
        assert!(profile.achievements[0].impact.is_none());
    }
}
