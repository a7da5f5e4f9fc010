//! Prompt templates for the pipeline stages.
//!
//! Each stage carries its own version marker, which is hashed into that
//! stage's fingerprint. Bump the marker whenever the template or system
//! prompt changes meaning — prior cache entries become unreachable without
//! any manual cache clearing.

use crate::pipeline::stages::StageId;

pub fn version(stage: StageId) -> &'static str {
    match stage {
        StageId::JobAnalysis => "job-analysis/v1",
        StageId::AchievementMatching => "achievement-matching/v1",
        StageId::DraftGeneration => "draft-generation/v1",
        StageId::CritiqueRefine => "critique-and-refine/v1",
        StageId::StructuredAssembly => "structured-assembly/v1",
    }
}

pub fn system(stage: StageId) -> &'static str {
    match stage {
        StageId::JobAnalysis => JOB_ANALYSIS_SYSTEM,
        StageId::AchievementMatching => ACHIEVEMENT_MATCHING_SYSTEM,
        StageId::DraftGeneration => DRAFT_GENERATION_SYSTEM,
        StageId::CritiqueRefine => CRITIQUE_REFINE_SYSTEM,
        StageId::StructuredAssembly => STRUCTURED_ASSEMBLY_SYSTEM,
    }
}

pub const JOB_ANALYSIS_SYSTEM: &str = "You are the job-analysis stage of a resume \
tailoring pipeline. You read one job posting and return structured JSON only — \
no prose, no markdown fences.";

pub const JOB_ANALYSIS_TEMPLATE: &str = r#"Analyze this job posting and return JSON with:
- "requirement_summary": array of short strings, one per real requirement
- "keyword_inventory": array of {"keyword", "frequency", "position_weight", "weighted_score"}
  where position_weight is 1.0 for title, 0.8 for requirements, 0.6 for responsibilities,
  0.3 for about-us text, and weighted_score = frequency * position_weight
- "detected_tone": one of "AggressiveStartup", "CollaborativeEnterprise",
  "ResearchOriented", "ProductOriented"

Job posting:
{job_json}
"#;

pub const ACHIEVEMENT_MATCHING_SYSTEM: &str = "You are the achievement-matching stage \
of a resume tailoring pipeline. You pair candidate achievements with job requirements \
and return structured JSON only.";

pub const ACHIEVEMENT_MATCHING_TEMPLATE: &str = r#"Given the job analysis and the candidate's
achievements (each with its zero-based index), decide which achievements answer which
requirements. Return JSON with:
- "matched": array of {"achievement_index", "relevance" (0.0-1.0), "requirement_refs": [strings]}
- "excluded": array of {"achievement_index", "reason"}

Only use achievement_index values that appear in the input. Do not invent achievements.

Job analysis:
{analysis_json}

Achievements:
{achievements_json}
"#;

pub const DRAFT_GENERATION_SYSTEM: &str = "You are the draft-generation stage of a \
resume tailoring pipeline. You write the first full resume body and return structured \
JSON only.";

pub const DRAFT_GENERATION_TEMPLATE: &str = r#"Write a tailored resume draft for this
candidate and role. Use only the matched achievements below — never invent experience.
Match the detected tone: {tone}. Return JSON with:
- "summary": a 2-3 sentence professional summary
- "sections": array of {"heading", "bullets": [strings]}

Job analysis:
{analysis_json}

Matched achievements:
{matches_json}

Candidate headline: {headline}
"#;

pub const CRITIQUE_REFINE_SYSTEM: &str = "You are the critique-and-refine stage of a \
resume tailoring pipeline. You review a draft against the job analysis, tighten it, \
and return structured JSON only.";

pub const CRITIQUE_REFINE_TEMPLATE: &str = r#"Critique this resume draft against the job
analysis, then produce a revised version. Cut weak bullets, strengthen verbs, keep every
claim grounded in the draft. Return JSON with:
- "revised_summary": string
- "revised_sections": array of {"heading", "bullets": [strings]}
- "notes": array of strings describing what you changed and why

Job analysis:
{analysis_json}

Draft:
{draft_json}
"#;

pub const STRUCTURED_ASSEMBLY_SYSTEM: &str = "You are the structured-assembly stage of \
a resume tailoring pipeline. You produce the final section ordering and skill groupings \
and return structured JSON only.";

pub const STRUCTURED_ASSEMBLY_TEMPLATE: &str = r#"Assemble the final resume structure from
the refined content and the candidate's skill groups. Order sections for this role, group
skills sensibly, keep wording exactly as given in the refined content unless a section
heading needs normalizing. Return JSON with:
- "summary": string
- "sections": array of {"heading", "bullets": [strings]}
- "skill_groups": array of {"name", "skills": [strings]}

Refined content:
{critique_json}

Candidate skill groups:
{skills_json}
"#;
