//! Phase 1: ANALYSIS
//!
//! BPM, key, tempo, duration, beat grid and vocal segments. Results already
//! stored on the song are reused without calling the analyzer.

use super::{Processor, RunContext, STEP_ANALYSIS};
use lyricreel_common::config::AudioStems;
use lyricreel_common::models::Job;
use lyricreel_common::{Error, Result};

impl Processor {
    pub(super) async fn phase_analysis(&self, job: &mut Job, ctx: &mut RunContext) -> Result<()> {
        tracing::info!(job_id = job.id, "Phase 1: ANALYSIS");

        if ctx.song.has_analysis() {
            let message = format!(
                "Using existing analysis: {:.1} BPM, {}",
                ctx.song.bpm, ctx.song.key
            );
            ctx.log.info(&message);
            self.checkpoint(job, STEP_ANALYSIS, 20, &message).await;
            return Ok(());
        }

        self.checkpoint(job, STEP_ANALYSIS, 5, "Loading audio files").await;
        let stems = AudioStems::resolve(&self.paths, &ctx.song);
        let audio_path = stems
            .best_available()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| Error::Validation("no audio file available for analysis".to_string()))?;
        ctx.log.property("Analysis Audio", audio_path.display());

        self.checkpoint(job, STEP_ANALYSIS, 10, "Running audio analysis (BPM, key, timing)")
            .await;
        let analysis = self.analyzer.analyze(&audio_path).await?;
        ctx.log.info(analysis.summary());

        self.checkpoint(job, STEP_ANALYSIS, 15, "Processing analysis results").await;
        let song = &mut ctx.song;
        song.bpm = analysis.bpm;
        song.key = analysis.key.clone();
        song.tempo = analysis.tempo.clone();
        song.duration_seconds = analysis.duration_seconds;
        song.vocal_timing = analysis.vocal_timing_json()?;
        if song.genre.trim().is_empty() && !analysis.genre.is_empty() {
            tracing::info!(song_id = song.id, genre = %analysis.genre, "Detected genre");
            song.genre = analysis.genre.clone();
        }

        // Vocal segments are more precise when measured on the isolated vocal stem
        if let Some(vocal) = stems.vocal.as_deref().filter(|v| *v != audio_path.as_path()) {
            match self.analyzer.analyze(vocal).await {
                Ok(vocal_analysis) => {
                    ctx.log.info(vocal_analysis.vocal_timing_info());
                    song.vocal_timing = vocal_analysis.vocal_timing_json()?;
                }
                Err(e) => {
                    tracing::warn!(song_id = song.id, error = %e, "Vocal stem analysis failed, keeping mix segments");
                }
            }
        }

        self.songs.update(song).await?;
        ctx.beats = analysis.beat_times;

        let message = format!("Analysis complete: {:.1} BPM, {}", song.bpm, song.key);
        ctx.log.success(&message);
        self.checkpoint(job, STEP_ANALYSIS, 20, &message).await;
        Ok(())
    }
}
