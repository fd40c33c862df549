//! Five-phase job processor
//!
//! # Phase progression
//! ANALYSIS (0-20) → LYRICS (20-30) → IMAGES (30-50) → RENDER (50-90) → PUBLISH (90-100)
//!
//! Each phase lives in its own `phase_*` module as an `impl Processor` block.
//! Every checkpoint updates the job, persists it and broadcasts a progress
//! update. The first failing phase aborts the run; its error is wrapped with
//! the phase name (`"{phase} failed: {cause}"`).

use crate::lyrics::{LyricsData, TimedLine};
use crate::render_log::RenderLog;
use crate::services::{AudioAnalyzer, SectionImageGenerator};
use crate::video::VideoComposer;
use lyricreel_common::config::StoragePaths;
use lyricreel_common::db::{JobRepository, SongRepository};
use lyricreel_common::models::{Job, Song};
use lyricreel_common::{Error, ProgressBroadcaster, Result};
use std::path::PathBuf;
use std::sync::Arc;

mod phase_analysis;
mod phase_images;
mod phase_lyrics;
mod phase_publish;
mod phase_render;

pub use phase_render::{build_image_segments, video_output_path};

pub(crate) const STEP_ANALYSIS: &str = "Analyzing audio";
pub(crate) const STEP_LYRICS: &str = "Processing lyrics";
pub(crate) const STEP_IMAGES: &str = "Generating images";
pub(crate) const STEP_RENDER: &str = "Rendering video";
pub(crate) const STEP_PUBLISH: &str = "Publishing video";

/// State carried between the phases of one run
pub(crate) struct RunContext {
    pub song: Song,
    /// Beat times from this run's analysis; empty when analysis was reused
    pub beats: Vec<f64>,
    pub lyrics: Option<LyricsData>,
    pub timed_lines: Vec<TimedLine>,
    pub images_dir: PathBuf,
    pub log: RenderLog,
}

/// Collaborators the processor needs, constructed in `main`
pub struct ProcessorDeps {
    pub jobs: Arc<dyn JobRepository>,
    pub songs: Arc<dyn SongRepository>,
    pub broadcaster: ProgressBroadcaster,
    pub analyzer: Arc<dyn AudioAnalyzer>,
    pub images: Arc<dyn SectionImageGenerator>,
    pub composer: VideoComposer,
    pub paths: StoragePaths,
}

/// Drives one job through all five phases
pub struct Processor {
    jobs: Arc<dyn JobRepository>,
    songs: Arc<dyn SongRepository>,
    broadcaster: ProgressBroadcaster,
    analyzer: Arc<dyn AudioAnalyzer>,
    images: Arc<dyn SectionImageGenerator>,
    composer: VideoComposer,
    paths: StoragePaths,
}

impl Processor {
    pub fn new(deps: ProcessorDeps) -> Self {
        Self {
            jobs: deps.jobs,
            songs: deps.songs,
            broadcaster: deps.broadcaster,
            analyzer: deps.analyzer,
            images: deps.images,
            composer: deps.composer,
            paths: deps.paths,
        }
    }

    /// Run all phases for `job`
    ///
    /// The song is reloaded so the run sees fresh data; `song` only supplies
    /// the id. On success `job.output_path` names the rendered video.
    pub async fn process(&self, job: &mut Job, song: &Song) -> Result<()> {
        let song = self
            .songs
            .get_by_id(song.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Song {} not found", song.id)))?;

        let log = RenderLog::create(&self.paths.logs_dir(), job.id, song.id).await;
        tracing::info!(
            job_id = job.id,
            song_id = song.id,
            title = %song.title,
            render_log = ?log.path(),
            "Processing job"
        );

        let mut ctx = RunContext {
            images_dir: self.paths.song_images_dir(song.id),
            log,
            song,
            beats: Vec::new(),
            lyrics: None,
            timed_lines: Vec::new(),
        };
        ctx.log.property("Title", &ctx.song.title);
        ctx.log.property("Artist", &ctx.song.artist_name);

        let result = self.run_phases(job, &mut ctx).await;
        match &result {
            Ok(()) => ctx.log.close(true, "Processing completed successfully").await,
            Err(e) => {
                ctx.log.error(e);
                ctx.log.close(false, "Processing failed").await;
            }
        }
        result
    }

    async fn run_phases(&self, job: &mut Job, ctx: &mut RunContext) -> Result<()> {
        ctx.log.phase("Audio Analysis", STEP_ANALYSIS);
        self.phase_analysis(job, ctx)
            .await
            .map_err(|e| e.in_phase("audio analysis"))?;

        ctx.log.phase("Lyrics Processing", STEP_LYRICS);
        self.phase_lyrics(job, ctx)
            .await
            .map_err(|e| e.in_phase("lyrics processing"))?;

        ctx.log.phase("Image Generation", STEP_IMAGES);
        self.phase_images(job, ctx)
            .await
            .map_err(|e| e.in_phase("image generation"))?;

        ctx.log.phase("Video Rendering", STEP_RENDER);
        self.phase_render(job, ctx)
            .await
            .map_err(|e| e.in_phase("video rendering"))?;

        ctx.log.phase("Publishing", STEP_PUBLISH);
        self.phase_publish(job, ctx)
            .await
            .map_err(|e| e.in_phase("publish"))?;

        Ok(())
    }

    /// Record a checkpoint: update the job, persist it, broadcast
    ///
    /// Persistence failures are logged and do not abort the run.
    pub(crate) async fn checkpoint(&self, job: &mut Job, step: &str, progress: i32, message: &str) {
        let stored = job.record_progress(step, progress);
        if let Err(e) = self.jobs.update(job).await {
            tracing::warn!(job_id = job.id, error = %e, "Failed to persist job progress");
        }
        self.broadcaster.broadcast_from_job(job, message);
        tracing::info!(job_id = job.id, progress = stored, step, "{}", message);
    }
}
