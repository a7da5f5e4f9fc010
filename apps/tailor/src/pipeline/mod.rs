//! StagePipeline — the fixed, ordered sequence of generation stages.
//!
//! Flow: job-analysis → achievement-matching → draft-generation →
//!       critique-and-refine → structured-assembly.
//!
//! Every stage follows the same transition: compute the fingerprint from
//! the accumulated state, consult the cache, then a previous run's
//! checkpoint, and only then call the generation collaborator. The stage's
//! validated output is checkpointed before the next stage starts, so a
//! crashed run leaves its completed work on disk. All mutable I/O (cache,
//! checkpoint) happens here at the transition boundary; stage logic itself
//! is pure data.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cache::fingerprint::fingerprint;
use crate::cache::CacheStore;
use crate::errors::PipelineError;
use crate::llm_client::{strip_json_fences, GenerationClient};
use crate::models::job::JobDescriptor;
use crate::models::profile::CareerProfile;
use crate::models::resume::{MatchedAchievement, StructuredResume};
use crate::pipeline::checkpoint::CheckpointWriter;
use crate::pipeline::stages::{
    AchievementMatches, AssembledResume, CritiqueNotes, DraftContent, JobAnalysis, StageId,
};
use crate::rundir::RunContext;

pub mod checkpoint;
pub mod prompts;
pub mod stages;

/// File name of the frozen StructuredResume under the run directory.
pub const RESUME_FILE: &str = "resume.json";

pub struct StagePipeline<'a> {
    client: &'a dyn GenerationClient,
    cache: &'a CacheStore,
    ctx: &'a RunContext,
    checkpoints: CheckpointWriter,
    /// A previous run's directory to resume checkpoints from, if any.
    resume_from: Option<PathBuf>,
}

impl<'a> StagePipeline<'a> {
    pub fn new(
        client: &'a dyn GenerationClient,
        cache: &'a CacheStore,
        ctx: &'a RunContext,
        resume_from: Option<PathBuf>,
    ) -> Result<Self, PipelineError> {
        let checkpoints = CheckpointWriter::new(&ctx.run_dir)?;
        Ok(Self {
            client,
            cache,
            ctx,
            checkpoints,
            resume_from,
        })
    }

    /// Runs all stages in order and freezes the StructuredResume. A stage
    /// failure aborts the run; checkpoints written so far stay on disk.
    pub async fn run(
        &self,
        job: &JobDescriptor,
        profile: &CareerProfile,
    ) -> Result<StructuredResume, PipelineError> {
        info!(
            "Run {} — tailoring for {} at {} (model {})",
            self.ctx.run_id,
            job.title,
            job.company,
            self.client.model_id()
        );

        // Stage 1: job-analysis
        let job_json = to_pretty(job)?;
        let prompt = prompts::JOB_ANALYSIS_TEMPLATE.replace("{job_json}", &job_json);
        let analysis: JobAnalysis = self
            .execute(
                StageId::JobAnalysis,
                &json!({ "job": job }),
                prompt,
                |a: &JobAnalysis| a.validate(),
            )
            .await?;
        info!(
            "Job analyzed: {} requirements, tone {:?}",
            analysis.requirement_summary.len(),
            analysis.detected_tone
        );

        // Stage 2: achievement-matching
        let indexed: Vec<Value> = profile
            .achievements
            .iter()
            .enumerate()
            .map(|(i, a)| json!({ "achievement_index": i, "achievement": a }))
            .collect();
        let prompt = prompts::ACHIEVEMENT_MATCHING_TEMPLATE
            .replace("{analysis_json}", &to_pretty(&analysis)?)
            .replace("{achievements_json}", &to_pretty(&indexed)?);
        let achievement_count = profile.achievements.len();
        let matches: AchievementMatches = self
            .execute(
                StageId::AchievementMatching,
                &json!({ "analysis": analysis, "achievements": profile.achievements }),
                prompt,
                |m: &AchievementMatches| m.validate(achievement_count),
            )
            .await?;
        info!(
            "Matched {} of {} achievements",
            matches.matched.len(),
            achievement_count
        );

        let matched_achievements: Vec<MatchedAchievement> = matches
            .matched
            .iter()
            .map(|m| {
                let a = &profile.achievements[m.achievement_index];
                MatchedAchievement {
                    title: a.title.clone(),
                    description: a.description.clone(),
                    relevance: m.relevance,
                    requirement_refs: m.requirement_refs.clone(),
                }
            })
            .collect();

        // Stage 3: draft-generation
        let prompt = prompts::DRAFT_GENERATION_TEMPLATE
            .replace("{tone}", &format!("{:?}", analysis.detected_tone))
            .replace("{analysis_json}", &to_pretty(&analysis)?)
            .replace("{matches_json}", &to_pretty(&matched_achievements)?)
            .replace("{headline}", &profile.headline);
        let draft: DraftContent = self
            .execute(
                StageId::DraftGeneration,
                &json!({
                    "analysis": analysis,
                    "matches": matched_achievements,
                    "headline": profile.headline,
                }),
                prompt,
                |d: &DraftContent| d.validate(),
            )
            .await?;
        info!("Draft generated: {} sections", draft.sections.len());

        // Stage 4: critique-and-refine
        let prompt = prompts::CRITIQUE_REFINE_TEMPLATE
            .replace("{analysis_json}", &to_pretty(&analysis)?)
            .replace("{draft_json}", &to_pretty(&draft)?);
        let critique: CritiqueNotes = self
            .execute(
                StageId::CritiqueRefine,
                &json!({ "analysis": analysis, "draft": draft }),
                prompt,
                |c: &CritiqueNotes| c.validate(),
            )
            .await?;
        info!("Critique pass made {} notes", critique.notes.len());

        // Stage 5: structured-assembly
        let prompt = prompts::STRUCTURED_ASSEMBLY_TEMPLATE
            .replace("{critique_json}", &to_pretty(&critique)?)
            .replace("{skills_json}", &to_pretty(&profile.skills)?);
        let assembled: AssembledResume = self
            .execute(
                StageId::StructuredAssembly,
                &json!({ "critique": critique, "skills": profile.skills }),
                prompt,
                |a: &AssembledResume| a.validate(),
            )
            .await?;

        // Freeze the StructuredResume and persist it as the run's final
        // structured output.
        let resume = StructuredResume {
            candidate_name: profile.name.clone(),
            company: job.company.clone(),
            title: job.title.clone(),
            summary: assembled.summary,
            matched_achievements,
            skill_groups: assembled.skill_groups,
            sections: assembled.sections,
        };
        checkpoint::write_json_atomic(&self.ctx.run_dir.join(RESUME_FILE), &resume)?;
        info!("Structured resume frozen for run {}", self.ctx.run_id);

        Ok(resume)
    }

    /// One stage transition. `inputs` is the stage's fingerprint payload:
    /// everything the prompt is built from, so a change in any upstream
    /// artifact or config yields a new fingerprint.
    async fn execute<T, F>(
        &self,
        stage: StageId,
        inputs: &Value,
        prompt: String,
        validate: F,
    ) -> Result<T, PipelineError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> Result<(), String>,
    {
        let stage_name = stage.as_str();
        let fp = fingerprint(
            stage_name,
            self.client.model_id(),
            prompts::version(stage),
            inputs,
        );

        if self.ctx.cache_enabled {
            if let Some(value) = self.cache.get(stage_name, &fp) {
                match parse_and_validate::<T, F>(&value, &validate) {
                    Ok(output) => {
                        info!("Stage '{stage_name}' adopted from cache");
                        self.checkpoints.write(stage_name, &fp, &value)?;
                        return Ok(output);
                    }
                    Err(e) => {
                        warn!("Cached entry for '{stage_name}' fails validation ({e}), regenerating")
                    }
                }
            }
        }

        // Checkpoint short-circuit works even with caching disabled: a
        // restarted run skips stages whose outputs survived the crash. A
        // checkpoint is only adopted when its recorded fingerprint matches
        // this run's — otherwise the previous run had different inputs and
        // its output must not enter this run or the cache.
        if let Some(prev) = &self.resume_from {
            if let Some(entry) = CheckpointWriter::load(prev, stage_name) {
                if entry.fingerprint != fp.as_str() {
                    warn!(
                        "Checkpoint for '{stage_name}' in {} was produced from \
                         different inputs, regenerating",
                        prev.display()
                    );
                } else {
                    match parse_and_validate::<T, F>(&entry.output, &validate) {
                        Ok(output) => {
                            info!(
                                "Stage '{stage_name}' resumed from checkpoint in {}",
                                prev.display()
                            );
                            if self.ctx.cache_enabled {
                                self.cache.put(stage_name, &fp, &entry.output)?;
                            }
                            self.checkpoints.write(stage_name, &fp, &entry.output)?;
                            return Ok(output);
                        }
                        Err(e) => {
                            warn!(
                                "Checkpoint for '{stage_name}' fails validation ({e}), regenerating"
                            )
                        }
                    }
                }
            }
        }

        info!("Stage '{stage_name}' calling generation model");
        let raw = self
            .client
            .generate(&prompt, prompts::system(stage))
            .await
            .map_err(|e| PipelineError::stage(stage_name, format!("generation failed: {e}")))?;

        let text = strip_json_fences(&raw);
        let value: Value = serde_json::from_str(text).map_err(|e| {
            PipelineError::stage(stage_name, format!("output is not valid JSON: {e}"))
        })?;
        let output = parse_and_validate::<T, F>(&value, &validate).map_err(|e| {
            PipelineError::stage(stage_name, format!("schema validation failed: {e}"))
        })?;

        if self.ctx.cache_enabled {
            self.cache.put(stage_name, &fp, &value)?;
        }
        self.checkpoints.write(stage_name, &fp, &value)?;

        Ok(output)
    }
}

fn parse_and_validate<T, F>(value: &Value, validate: &F) -> Result<T, String>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Result<(), String>,
{
    let output: T = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    validate(&output)?;
    Ok(output)
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, PipelineError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| PipelineError::Internal(anyhow::anyhow!("Failed to serialize prompt input: {e}")))
}
