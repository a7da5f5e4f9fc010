use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tailor::config::Config;
use tailor::errors::PipelineError;
use tailor::llm_client::AnthropicClient;
use tailor::models::job::JobDescriptor;
use tailor::models::profile::CareerProfile;
use tailor::pipeline::StagePipeline;
use tailor::cache::CacheStore;
use tailor::render::{backend_for, BackendKind};
use tailor::rundir::RunDirectoryManager;
use tailor::upload::{NoopUploader, UploadDispatcher, UploadSummary};

#[derive(Parser, Debug)]
#[command(
    name = "tailor",
    version,
    about = "Tailors a resume to a job posting through a cached, versioned generation pipeline"
)]
struct Cli {
    /// Path to the JobDescriptor JSON file
    #[arg(long)]
    job: PathBuf,

    /// Path to the CareerProfile JSON file
    #[arg(long)]
    profile: PathBuf,

    /// Base directory for versioned run output
    #[arg(long, default_value = "output")]
    out: PathBuf,

    /// Generation cache directory, shared across runs
    #[arg(long, default_value = ".tailor-cache")]
    cache_dir: PathBuf,

    /// Render backend: "latex" (markup only) or "pdf" (compiled in-process)
    #[arg(long, default_value = "latex")]
    backend: String,

    /// Document template id ("classic" or "compact")
    #[arg(long, default_value = "classic")]
    template: String,

    /// Disable the generation cache for this run
    #[arg(long)]
    no_cache: bool,

    /// Previous run directory to resume checkpoints from
    #[arg(long)]
    resume_from: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(summary) => {
            // Upload failures are warnings, never a failed run.
            if !summary.is_clean() {
                for (path, reason) in &summary.failed {
                    warn!("Upload failed: {} ({reason})", path.display());
                }
                eprintln!(
                    "Completed with {} of {} uploads failed",
                    summary.failed.len(),
                    summary.attempted
                );
            }
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<UploadSummary, PipelineError> {
    // Configuration resolves first; anything missing aborts before any
    // stage runs.
    let config =
        Config::from_env().map_err(|e| PipelineError::Configuration(format!("{e:#}")))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tailor v{}", env!("CARGO_PKG_VERSION"));

    let backend: BackendKind = cli.backend.parse().map_err(PipelineError::Configuration)?;
    let job = JobDescriptor::load(&cli.job)?;
    let profile = CareerProfile::load(&cli.profile)?;

    let manager = RunDirectoryManager::new(&cli.out);
    let ctx = manager.allocate(backend, !cli.no_cache)?;

    let cache = CacheStore::new(&cli.cache_dir);
    let client = AnthropicClient::new(config.anthropic_api_key.clone(), config.model.clone());

    let pipeline = StagePipeline::new(&client, &cache, &ctx, cli.resume_from.clone())?;
    let resume = pipeline.run(&job, &profile).await?;

    let artifacts = backend_for(ctx.backend).render(&resume, &cli.template, &ctx.run_dir)?;

    // The latest pointer only moves once every artifact is in place.
    manager.finalize(&ctx)?;

    let dispatcher = UploadDispatcher::new(Arc::new(NoopUploader));
    let summary = dispatcher.dispatch(&artifacts).await;

    info!(
        "Run {} complete: {} artifact(s) under {}",
        ctx.run_id,
        artifacts.len(),
        ctx.run_dir.display()
    );

    Ok(summary)
}
