//! lyricreel-orchestrator - lyric video render service
//!
//! Runs the queue worker and serves `/health` plus the `/events` progress
//! stream.

use anyhow::{Context, Result};
use clap::Parser;
use lyricreel_common::config::{resolve_root_folder, OrchestratorConfig, StoragePaths, ROOT_FOLDER_ENV};
use lyricreel_common::db::{init_database, SqliteJobRepository, SqliteSongRepository};
use lyricreel_common::ProgressBroadcaster;
use lyricreel_orchestrator::services::{ImageGenerationClient, ScriptAudioAnalyzer, SystemCommandRunner};
use lyricreel_orchestrator::video::{RenderSettings, VideoComposer};
use lyricreel_orchestrator::{build_router, AppState, Processor, ProcessorDeps, QueueWorker};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "lyricreel-orchestrator", version, about = "Lyric video render orchestrator")]
struct Args {
    /// Data root folder (database, images, videos, logs)
    #[arg(long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<String>,

    /// Config file; defaults to `<root>/lyricreel.toml`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the queue poll interval in seconds
    #[arg(long)]
    poll_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    info!("Starting lyricreel-orchestrator v{}", env!("CARGO_PKG_VERSION"));

    let root = resolve_root_folder(args.root_folder.as_deref(), args.config.as_deref());
    let paths = StoragePaths::new(&root);
    let config_path = args.config.clone().unwrap_or_else(|| paths.config_path());
    let mut config = OrchestratorConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    if let Some(secs) = args.poll_interval {
        config.worker.poll_interval_secs = secs;
    }

    paths.ensure_directories()?;
    info!(root = %root.display(), "Root folder ready");

    let pool = init_database(&paths.database_path()).await?;
    let jobs = Arc::new(SqliteJobRepository::new(pool.clone()));
    let songs = Arc::new(SqliteSongRepository::new(pool));
    let broadcaster = ProgressBroadcaster::new();

    let runner = Arc::new(SystemCommandRunner::new());
    let analyzer = Arc::new(ScriptAudioAnalyzer::new(runner.clone(), &config.analysis));
    let images = Arc::new(ImageGenerationClient::new(config.image.clone())?);
    let composer = VideoComposer::new(runner, RenderSettings::from_config(&config.render, &paths));

    let processor = Processor::new(ProcessorDeps {
        jobs: jobs.clone(),
        songs: songs.clone(),
        broadcaster: broadcaster.clone(),
        analyzer,
        images,
        composer,
        paths: paths.clone(),
    });
    let worker = QueueWorker::new(jobs, songs, processor, broadcaster.clone(), config.worker.poll_interval());
    let stop = worker.cancellation_token();
    let worker_handle = worker.spawn();

    let app = build_router(AppState::new(broadcaster));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!("Listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    stop.cancel();
    if tokio::time::timeout(Duration::from_secs(5), worker_handle).await.is_err() {
        info!("Worker still busy with a job, exiting without waiting");
    }
    Ok(())
}
