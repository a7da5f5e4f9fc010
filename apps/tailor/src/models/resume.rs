//! StructuredResume — the accumulated, typed result of the full pipeline.
//!
//! Built incrementally: each stage contributes or refines a sub-field, and
//! the value is frozen once structured-assembly completes. Serialized as
//! `resume.json` under the run directory.

use serde::{Deserialize, Serialize};

use crate::models::profile::SkillGroup;

/// One rendered resume section: a heading plus its bullets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeSection {
    pub heading: String,
    pub bullets: Vec<String>,
}

/// An achievement that survived stage-2 matching, resolved from its
/// profile index to content plus the requirements it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedAchievement {
    pub title: String,
    pub description: String,
    /// 0.0 – 1.0, as judged by the matching stage.
    pub relevance: f32,
    /// Requirement texts from the job this achievement addresses.
    pub requirement_refs: Vec<String>,
}

/// The final structured output of a run. Frozen after the last stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResume {
    pub candidate_name: String,
    pub company: String,
    pub title: String,
    pub summary: String,
    pub matched_achievements: Vec<MatchedAchievement>,
    pub skill_groups: Vec<SkillGroup>,
    pub sections: Vec<ResumeSection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_resume_round_trips_byte_identical() {
        // Determinism of the serialized form is what the cache invariant
        // ("byte-identical StructuredResume content") rests on.
        let resume = StructuredResume {
            candidate_name: "Sam".to_string(),
            company: "Acme".to_string(),
            title: "Engineer".to_string(),
            summary: "Systems engineer with a caching habit.".to_string(),
            matched_achievements: vec![MatchedAchievement {
                title: "Cut latency".to_string(),
                description: "Rewrote the hot path".to_string(),
                relevance: 0.9,
                requirement_refs: vec!["Rust".to_string()],
            }],
            skill_groups: vec![],
            sections: vec![ResumeSection {
                heading: "Experience".to_string(),
                bullets: vec!["Did the thing".to_string()],
            }],
        };

        let a = serde_json::to_string_pretty(&resume).unwrap();
        let again: StructuredResume = serde_json::from_str(&a).unwrap();
        let b = serde_json::to_string_pretty(&again).unwrap();
        assert_eq!(a, b);
    }
}
