//! End-to-end pipeline properties, driven by a mock generation client.
//!
//! Covers: determinism with caching, zero external calls on a warm cache,
//! model-change invalidation, fail-fast with surviving checkpoints,
//! checkpoint-based resume, and the full Acme/Engineer scenario through
//! the compiled backend.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use tailor::cache::CacheStore;
use tailor::errors::PipelineError;
use tailor::llm_client::{GenerationClient, LlmError};
use tailor::models::job::{JobDescriptor, Requirement};
use tailor::models::profile::{Achievement, CareerProfile, SkillGroup};
use tailor::pipeline::{StagePipeline, RESUME_FILE};
use tailor::render::{backend_for, ArtifactKind, BackendKind};
use tailor::rundir::{read_latest, RunDirectoryManager};

// ────────────────────────────────────────────────────────────────────────────
// Mock generation client
// ────────────────────────────────────────────────────────────────────────────

/// Deterministic mock: dispatches on the stage name embedded in each
/// stage's system prompt, counts every call, and can be told to fail one
/// stage with a non-transient error.
struct MockClient {
    model: String,
    calls: Arc<AtomicUsize>,
    fail_stage: Option<&'static str>,
}

impl MockClient {
    fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            fail_stage: None,
        }
    }

    fn failing_at(model: &str, stage: &'static str) -> Self {
        Self {
            fail_stage: Some(stage),
            ..Self::new(model)
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for MockClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(stage) = self.fail_stage {
            if system.contains(stage) {
                return Err(LlmError::Api {
                    status: 400,
                    message: "induced failure".to_string(),
                });
            }
        }

        // Keyed to the posting in the prompt, so different jobs yield
        // different outputs and the divergence cascades through every
        // downstream fingerprint.
        let company = if prompt.contains("Globex") { "Globex" } else { "Acme" };

        if system.contains("job-analysis") {
            // Fenced on purpose: the pipeline must strip code fences.
            Ok(format!(
                r#"```json
{{
  "requirement_summary": ["{company} requirement", "Systems design"],
  "keyword_inventory": [
    {{"keyword": "Rust", "frequency": 3, "position_weight": 0.8, "weighted_score": 2.4}}
  ],
  "detected_tone": "CollaborativeEnterprise"
}}
```"#
            ))
        } else if system.contains("achievement-matching") {
            Ok(r#"{
  "matched": [
    {"achievement_index": 0, "relevance": 0.9, "requirement_refs": ["Rust experience"]},
    {"achievement_index": 2, "relevance": 0.7, "requirement_refs": ["Systems design"]}
  ],
  "excluded": [{"achievement_index": 1, "reason": "unrelated domain"}]
}"#
            .to_string())
        } else if system.contains("draft-generation") {
            Ok(r#"{
  "summary": "Engineer who ships reliable systems.",
  "sections": [
    {"heading": "Experience", "bullets": ["Rewrote the cache in Rust", "Designed the ingest path"]}
  ]
}"#
            .to_string())
        } else if system.contains("critique-and-refine") {
            Ok(format!(
                r#"{{
  "revised_summary": "Systems engineer who ships reliable, measured work.",
  "revised_sections": [
    {{"heading": "Experience", "bullets": ["Rewrote the cache in Rust, cutting p99 40%", "Designed the ingest path"]}}
  ],
  "notes": ["Quantified the cache bullet for the {company} posting"]
}}"#
            ))
        } else if system.contains("structured-assembly") {
            Ok(r#"{
  "summary": "Systems engineer who ships reliable, measured work.",
  "sections": [
    {"heading": "Experience", "bullets": ["Rewrote the cache in Rust, cutting p99 40%", "Designed the ingest path"]}
  ],
  "skill_groups": [{"name": "Languages", "skills": ["Rust"]}]
}"#
            .to_string())
        } else {
            Err(LlmError::EmptyContent)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

fn acme_job() -> JobDescriptor {
    JobDescriptor {
        company: "Acme".to_string(),
        title: "Engineer".to_string(),
        raw_text: "Acme needs an engineer who knows Rust and systems design.".to_string(),
        requirements: vec![
            Requirement {
                text: "Rust experience".to_string(),
                is_required: true,
            },
            Requirement {
                text: "Systems design".to_string(),
                is_required: true,
            },
        ],
    }
}

fn globex_job() -> JobDescriptor {
    JobDescriptor {
        company: "Globex".to_string(),
        title: "Engineer".to_string(),
        raw_text: "Globex wants an engineer with Rust depth.".to_string(),
        requirements: vec![Requirement {
            text: "Rust experience".to_string(),
            is_required: true,
        }],
    }
}

fn sam_profile() -> CareerProfile {
    let achievement = |title: &str, desc: &str| Achievement {
        title: title.to_string(),
        description: desc.to_string(),
        skills: vec!["Rust".to_string()],
        impact: None,
    };
    CareerProfile {
        name: "Sam Doe".to_string(),
        headline: "Systems engineer".to_string(),
        achievements: vec![
            achievement("Cache rewrite", "Rewrote the cache in Rust"),
            achievement("Docs overhaul", "Rewrote the onboarding docs"),
            achievement("Ingest design", "Designed the ingest path"),
        ],
        skills: vec![SkillGroup {
            name: "Languages".to_string(),
            skills: vec!["Rust".to_string()],
        }],
        history: vec![],
    }
}

fn at(s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 8, 23)
        .unwrap()
        .and_hms_opt(10, 0, s)
        .unwrap()
}

async fn run_once(
    client: &MockClient,
    cache: &CacheStore,
    base: &Path,
    second: u32,
    job: &JobDescriptor,
    cache_enabled: bool,
    resume_from: Option<std::path::PathBuf>,
) -> Result<(tailor::models::resume::StructuredResume, std::path::PathBuf), PipelineError> {
    let manager = RunDirectoryManager::new(base);
    let ctx = manager.allocate_at(at(second), BackendKind::Latex, cache_enabled)?;
    let pipeline = StagePipeline::new(client, cache, &ctx, resume_from)?;
    let resume = pipeline.run(job, &sam_profile()).await?;
    Ok((resume, ctx.run_dir))
}

// ────────────────────────────────────────────────────────────────────────────
// Properties
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_second_cached_run_is_byte_identical_with_zero_calls() {
    let out = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(cache_dir.path());
    let client = MockClient::new("model-a");

    let (_, first_dir) = run_once(&client, &cache, out.path(), 0, &acme_job(), true, None)
        .await
        .unwrap();
    assert_eq!(client.call_count(), 5, "cold run calls every stage once");

    let (_, second_dir) = run_once(&client, &cache, out.path(), 1, &acme_job(), true, None)
        .await
        .unwrap();
    assert_eq!(client.call_count(), 5, "warm run makes zero external calls");

    let a = std::fs::read(first_dir.join(RESUME_FILE)).unwrap();
    let b = std::fs::read(second_dir.join(RESUME_FILE)).unwrap();
    assert_eq!(a, b, "StructuredResume content is byte-identical");
    assert_ne!(first_dir, second_dir, "each run gets its own directory");
}

#[tokio::test]
async fn test_model_change_invalidates_cache() {
    let out = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(cache_dir.path());

    let client_a = MockClient::new("model-a");
    run_once(&client_a, &cache, out.path(), 0, &acme_job(), true, None)
        .await
        .unwrap();
    assert_eq!(client_a.call_count(), 5);

    // Same inputs, different model id: every fingerprint changes, so every
    // stage is a miss and calls out fresh.
    let client_b = MockClient::new("model-b");
    run_once(&client_b, &cache, out.path(), 1, &acme_job(), true, None)
        .await
        .unwrap();
    assert_eq!(client_b.call_count(), 5);

    // And model-a entries are still intact: a third model-a run is free.
    let client_a2 = MockClient::new("model-a");
    run_once(&client_a2, &cache, out.path(), 2, &acme_job(), true, None)
        .await
        .unwrap();
    assert_eq!(client_a2.call_count(), 0);
}

#[tokio::test]
async fn test_stage_failure_aborts_run_but_keeps_earlier_checkpoints() {
    let out = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(cache_dir.path());
    let client = MockClient::failing_at("model-a", "draft-generation");

    let err = run_once(&client, &cache, out.path(), 0, &acme_job(), false, None)
        .await
        .unwrap_err();

    match &err {
        PipelineError::Stage { stage, .. } => assert_eq!(*stage, "draft-generation"),
        other => panic!("expected Stage error, got {other:?}"),
    }
    assert_eq!(err.exit_code(), 2);

    let run_dir = out
        .path()
        .join("2026-08-23")
        .join("run_100000");
    // No final output was emitted...
    assert!(!run_dir.join(RESUME_FILE).exists());
    // ...but completed stages left their checkpoints for inspection.
    let checkpoints = run_dir.join("checkpoints");
    assert!(checkpoints.join("job-analysis.json").is_file());
    assert!(checkpoints.join("achievement-matching.json").is_file());
    assert!(!checkpoints.join("draft-generation.json").exists());
}

#[tokio::test]
async fn test_restarted_run_resumes_from_checkpoints_without_caching() {
    let out = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(cache_dir.path());

    let client = MockClient::new("model-a");
    let (first_resume, first_dir) =
        run_once(&client, &cache, out.path(), 0, &acme_job(), false, None)
            .await
            .unwrap();
    assert_eq!(client.call_count(), 5);

    // Caching stays disabled; the new run adopts the previous run's
    // checkpoints instead.
    let client2 = MockClient::new("model-a");
    let (second_resume, _) = run_once(
        &client2,
        &cache,
        out.path(),
        1,
        &acme_job(),
        false,
        Some(first_dir),
    )
    .await
    .unwrap();
    assert_eq!(client2.call_count(), 0, "all stages resumed from checkpoints");
    assert_eq!(
        serde_json::to_string(&first_resume).unwrap(),
        serde_json::to_string(&second_resume).unwrap()
    );
}

#[tokio::test]
async fn test_resume_from_a_different_jobs_run_regenerates_and_keeps_cache_clean() {
    let out = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(cache_dir.path());

    // An uncached Acme run leaves its checkpoints behind.
    let client = MockClient::new("model-a");
    let (_, acme_dir) = run_once(&client, &cache, out.path(), 0, &acme_job(), false, None)
        .await
        .unwrap();

    // A Globex run pointed at the Acme directory must not adopt those
    // checkpoints: the recorded fingerprints belong to different inputs.
    let client2 = MockClient::new("model-a");
    let (globex_resume, _) = run_once(
        &client2,
        &cache,
        out.path(),
        1,
        &globex_job(),
        true,
        Some(acme_dir),
    )
    .await
    .unwrap();
    assert_eq!(
        client2.call_count(),
        5,
        "foreign checkpoints rejected, every stage regenerated"
    );

    // The cache only ever saw genuine Globex outputs: a fresh cached run
    // is free and serves Globex content, not Acme's.
    let client3 = MockClient::new("model-a");
    let (fresh_resume, fresh_dir) = run_once(
        &client3,
        &cache,
        out.path(),
        2,
        &globex_job(),
        true,
        None,
    )
    .await
    .unwrap();
    assert_eq!(client3.call_count(), 0);
    assert_eq!(
        serde_json::to_string(&globex_resume).unwrap(),
        serde_json::to_string(&fresh_resume).unwrap()
    );

    let analysis = std::fs::read_to_string(
        fresh_dir.join("checkpoints").join("job-analysis.json"),
    )
    .unwrap();
    assert!(analysis.contains("Globex requirement"));
    assert!(!analysis.contains("Acme requirement"));
}

#[tokio::test]
async fn test_acme_engineer_scenario_with_compiled_backend() {
    let out = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = CacheStore::new(cache_dir.path());
    let client = MockClient::new("model-a");

    let manager = RunDirectoryManager::new(out.path());
    let ctx = manager
        .allocate_at(at(0), BackendKind::MarkupPdf, true)
        .unwrap();
    let pipeline = StagePipeline::new(&client, &cache, &ctx, None).unwrap();
    let resume = pipeline.run(&acme_job(), &sam_profile()).await.unwrap();

    // Exactly the achievements matched by stage 2, resolved to content.
    let titles: Vec<&str> = resume
        .matched_achievements
        .iter()
        .map(|a| a.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Cache rewrite", "Ingest design"]);

    let artifacts = backend_for(ctx.backend)
        .render(&resume, "classic", &ctx.run_dir)
        .unwrap();
    manager.finalize(&ctx).unwrap();

    assert_eq!(artifacts.len(), 2);
    assert_eq!(artifacts[0].kind, ArtifactKind::SourceMarkup);
    assert_eq!(artifacts[1].kind, ArtifactKind::CompiledDocument);
    // Artifact names come from the deterministic company+title slug.
    assert!(ctx.run_dir.join("acme-engineer.tex").is_file());
    assert!(ctx.run_dir.join("acme-engineer.pdf").is_file());

    assert_eq!(read_latest(&ctx.date_dir).unwrap(), ctx.run_dir);
}
