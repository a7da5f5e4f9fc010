//! Stage identifiers and the typed output of each pipeline stage.
//!
//! Every stage output is deserialized from the generation collaborator's
//! JSON and then validated with a pure check. A failed parse or check is a
//! schema-validation failure: non-transient, never retried.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::resume::ResumeSection;
use crate::models::profile::SkillGroup;

/// The fixed, ordered stage sequence. No stage may run out of order and
/// none may be skipped except via a cache or checkpoint short-circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    JobAnalysis,
    AchievementMatching,
    DraftGeneration,
    CritiqueRefine,
    StructuredAssembly,
}

impl StageId {
    pub const ALL: [StageId; 5] = [
        StageId::JobAnalysis,
        StageId::AchievementMatching,
        StageId::DraftGeneration,
        StageId::CritiqueRefine,
        StageId::StructuredAssembly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::JobAnalysis => "job-analysis",
            StageId::AchievementMatching => "achievement-matching",
            StageId::DraftGeneration => "draft-generation",
            StageId::CritiqueRefine => "critique-and-refine",
            StageId::StructuredAssembly => "structured-assembly",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 1: job-analysis
// ────────────────────────────────────────────────────────────────────────────

/// Detected tone of the posting. Drives verb choice in the draft prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum JobTone {
    AggressiveStartup,
    #[default]
    CollaborativeEnterprise,
    ResearchOriented,
    ProductOriented,
}

/// A keyword from the posting, weighted by where and how often it appears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,
    pub frequency: u32,
    /// title=1.0, requirements=0.8, responsibilities=0.6, about=0.3
    pub position_weight: f32,
    /// frequency * position_weight
    pub weighted_score: f32,
}

/// Output of the job-analysis stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAnalysis {
    pub requirement_summary: Vec<String>,
    pub keyword_inventory: Vec<KeywordEntry>,
    pub detected_tone: JobTone,
}

impl JobAnalysis {
    pub fn validate(&self) -> Result<(), String> {
        if self.requirement_summary.is_empty() {
            return Err("job analysis produced no requirement summary".to_string());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 2: achievement-matching
// ────────────────────────────────────────────────────────────────────────────

/// One profile achievement matched to requirements, by index into
/// `CareerProfile::achievements`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementMatch {
    pub achievement_index: usize,
    pub relevance: f32,
    pub requirement_refs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedAchievement {
    pub achievement_index: usize,
    pub reason: String,
}

/// Output of the achievement-matching stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementMatches {
    pub matched: Vec<AchievementMatch>,
    #[serde(default)]
    pub excluded: Vec<ExcludedAchievement>,
}

impl AchievementMatches {
    /// Every match must reference a real achievement with a sane relevance.
    pub fn validate(&self, achievement_count: usize) -> Result<(), String> {
        if self.matched.is_empty() {
            return Err("no achievements matched the job requirements".to_string());
        }
        for m in &self.matched {
            if m.achievement_index >= achievement_count {
                return Err(format!(
                    "match references achievement index {} but the profile has {}",
                    m.achievement_index, achievement_count
                ));
            }
            if !(0.0..=1.0).contains(&m.relevance) {
                return Err(format!(
                    "match for achievement {} has relevance {} outside 0.0–1.0",
                    m.achievement_index, m.relevance
                ));
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 3: draft-generation
// ────────────────────────────────────────────────────────────────────────────

/// Output of the draft-generation stage: a first full pass at the resume
/// body, before critique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftContent {
    pub summary: String,
    pub sections: Vec<ResumeSection>,
}

impl DraftContent {
    pub fn validate(&self) -> Result<(), String> {
        if self.summary.trim().is_empty() {
            return Err("draft has an empty summary".to_string());
        }
        if self.sections.is_empty() {
            return Err("draft has no sections".to_string());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 4: critique-and-refine
// ────────────────────────────────────────────────────────────────────────────

/// Output of the critique-and-refine stage: the draft after a self-review
/// pass, with the reviewer's notes kept for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueNotes {
    pub revised_summary: String,
    pub revised_sections: Vec<ResumeSection>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl CritiqueNotes {
    pub fn validate(&self) -> Result<(), String> {
        if self.revised_summary.trim().is_empty() {
            return Err("critique produced an empty revised summary".to_string());
        }
        if self.revised_sections.is_empty() {
            return Err("critique dropped every section".to_string());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 5: structured-assembly
// ────────────────────────────────────────────────────────────────────────────

/// Output of the structured-assembly stage: final section ordering and
/// skill groupings. The runner combines this with the job and profile
/// identity fields to freeze the StructuredResume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledResume {
    pub summary: String,
    pub sections: Vec<ResumeSection>,
    pub skill_groups: Vec<SkillGroup>,
}

impl AssembledResume {
    pub fn validate(&self) -> Result<(), String> {
        if self.summary.trim().is_empty() {
            return Err("assembled resume has an empty summary".to_string());
        }
        if self.sections.is_empty() {
            return Err("assembled resume has no sections".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_fixed() {
        let names: Vec<&str> = StageId::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "job-analysis",
                "achievement-matching",
                "draft-generation",
                "critique-and-refine",
                "structured-assembly",
            ]
        );
    }

    #[test]
    fn test_achievement_match_index_out_of_range_fails_validation() {
        let matches = AchievementMatches {
            matched: vec![AchievementMatch {
                achievement_index: 3,
                relevance: 0.8,
                requirement_refs: vec![],
            }],
            excluded: vec![],
        };
        let err = matches.validate(3).unwrap_err();
        assert!(err.contains("index 3"));
    }

    #[test]
    fn test_achievement_match_relevance_out_of_bounds_fails() {
        let matches = AchievementMatches {
            matched: vec![AchievementMatch {
                achievement_index: 0,
                relevance: 1.5,
                requirement_refs: vec![],
            }],
            excluded: vec![],
        };
        assert!(matches.validate(1).is_err());
    }

    #[test]
    fn test_empty_matches_fail_validation() {
        let matches = AchievementMatches {
            matched: vec![],
            excluded: vec![],
        };
        assert!(matches.validate(5).is_err());
    }

    #[test]
    fn test_job_tone_default_is_collaborative() {
        assert_eq!(JobTone::default(), JobTone::CollaborativeEnterprise);
    }

    #[test]
    fn test_draft_with_empty_summary_fails_validation() {
        let draft = DraftContent {
            summary: "  ".to_string(),
            sections: vec![ResumeSection {
                heading: "Experience".to_string(),
                bullets: vec!["x".to_string()],
            }],
        };
        assert!(draft.validate().is_err());
    }
}
