//! Phase 4: RENDER
//!
//! Selects the audio track, maps sections to image segments and runs the
//! composition engine.

use super::{Processor, RunContext, STEP_RENDER};
use crate::lyrics::{Section, TimedLine};
use crate::services::image_filename;
use crate::video::{ImageSegment, LyricLine, RenderRequest};
use lyricreel_common::config::{AudioStems, StoragePaths};
use lyricreel_common::models::Job;
use lyricreel_common::{Error, Result};
use std::path::{Path, PathBuf};

/// Seconds per line when a section has no usable timing
const FALLBACK_SECS_PER_LINE: f64 = 3.0;
/// Length given to a section whose timing collapsed to zero or less
const FALLBACK_SECTION_SECS: f64 = 10.0;

/// Map each section with an existing image to a time range
///
/// The range covers the timed lines `start_line..=end_line`. Sections whose
/// image is missing on disk are skipped.
pub fn build_image_segments(
    sections: &[Section],
    timed_lines: &[TimedLine],
    images_dir: &Path,
    total_duration: f64,
) -> Result<Vec<ImageSegment>> {
    let mut segments = Vec::with_capacity(sections.len());

    for section in sections {
        let image_path = images_dir.join(image_filename(section.section_type.as_str(), section.number));
        if !image_path.is_file() {
            tracing::warn!(image = %image_path.display(), "Image not found, skipping section");
            continue;
        }

        let mut start = total_duration;
        let mut end = 0.0_f64;
        for line in timed_lines
            .iter()
            .skip(section.start_line)
            .take(section.end_line + 1 - section.start_line)
        {
            start = start.min(line.start_time);
            end = end.max(line.end_time);
        }

        if start >= total_duration || end <= 0.0 {
            start = section.start_line as f64 * FALLBACK_SECS_PER_LINE;
            end = (section.end_line + 1) as f64 * FALLBACK_SECS_PER_LINE;
        }
        if start >= end {
            end = start + FALLBACK_SECTION_SECS;
        }

        segments.push(ImageSegment {
            image_path,
            start_time: start,
            end_time: end,
        });
    }

    if segments.is_empty() {
        return Err(Error::Validation("no image segments created".to_string()));
    }
    Ok(segments)
}

/// `videos/<title with spaces replaced by '_'>.mp4`
pub fn video_output_path(paths: &StoragePaths, title: &str) -> PathBuf {
    paths.videos_dir().join(format!("{}.mp4", title.replace(' ', "_")))
}

fn non_empty_path(text: &str) -> Option<PathBuf> {
    let text = text.trim();
    (!text.is_empty()).then(|| PathBuf::from(text))
}

impl Processor {
    pub(super) async fn phase_render(&self, job: &mut Job, ctx: &mut RunContext) -> Result<()> {
        tracing::info!(job_id = job.id, "Phase 4: RENDER");

        self.checkpoint(job, STEP_RENDER, 55, "Preparing video assets").await;
        let (audio_path, mixed_temp) = self.select_audio(ctx).await?;
        ctx.log.property("Audio", audio_path.display());

        let result = self.render_with_audio(job, ctx, audio_path).await;

        if let Some(mixed) = mixed_temp {
            if let Err(e) = tokio::fs::remove_file(&mixed).await {
                tracing::debug!(path = %mixed.display(), error = %e, "Could not remove mixed audio");
            }
        }
        result
    }

    /// Returns the audio to render with and, when stems were mixed, the temp file to delete
    async fn select_audio(&self, ctx: &RunContext) -> Result<(PathBuf, Option<PathBuf>)> {
        let stems = AudioStems::resolve(&self.paths, &ctx.song);

        let mut selected = None;
        let mut mixed_temp = None;
        if let (Some(vocal), Some(music)) = (stems.vocal.as_deref(), stems.music.as_deref()) {
            let mixed = self
                .paths
                .temp_dir()
                .join(format!("mixed_{}.wav", ctx.song.id));
            match self.composer.mix_stems(vocal, music, &mixed).await {
                Ok(()) => {
                    ctx.log.info("Mixed vocal and music stems");
                    selected = Some(mixed.clone());
                    mixed_temp = Some(mixed);
                }
                Err(e) => {
                    tracing::warn!(song_id = ctx.song.id, error = %e, "Stem mix failed, using single track");
                }
            }
        }

        let audio = match selected {
            Some(path) => path,
            None => stems
                .best_available()
                .map(Path::to_path_buf)
                .ok_or_else(|| Error::Validation("no audio file available for rendering".to_string()))?,
        };
        if !audio.is_file() {
            return Err(Error::Validation(format!(
                "audio file not found: {}",
                audio.display()
            )));
        }
        Ok((audio, mixed_temp))
    }

    async fn render_with_audio(&self, job: &mut Job, ctx: &mut RunContext, audio_path: PathBuf) -> Result<()> {
        self.checkpoint(job, STEP_RENDER, 60, "Loading lyrics and images").await;
        let sections = ctx.lyrics.as_ref().map(|l| l.sections.as_slice()).unwrap_or_default();
        let images = build_image_segments(
            sections,
            &ctx.timed_lines,
            &ctx.images_dir,
            ctx.song.duration_seconds,
        )?;
        let lyrics: Vec<LyricLine> = ctx
            .timed_lines
            .iter()
            .filter(|l| !l.text.trim().is_empty())
            .map(|l| LyricLine {
                text: l.text.clone(),
                start_time: l.start_time,
                end_time: l.end_time,
            })
            .collect();
        let vocal_onset = ctx.song.vocal_onset().unwrap_or(0.0);
        ctx.log.property("Image Segments", images.len());
        ctx.log.property("Lyric Lines", lyrics.len());
        ctx.log.property("Vocal Onset", format!("{:.2}s", vocal_onset));

        self.checkpoint(job, STEP_RENDER, 70, "Composing video with FFmpeg").await;
        let subtitle_path = non_empty_path(&ctx.song.karaoke_subtitle_path).filter(|p| p.is_file());
        if subtitle_path.is_some() {
            self.checkpoint(job, STEP_RENDER, 72, "Using karaoke subtitle track").await;
        }

        let song = &ctx.song;
        let request = RenderRequest {
            audio_path,
            duration: song.duration_seconds,
            images,
            lyrics,
            vocal_onset,
            subtitle_path,
            key: song.key.clone(),
            tempo: song.tempo.clone(),
            bpm: song.bpm,
            title: song.title.clone(),
            artist: song.artist_name.clone(),
            spectrum_style: song.spectrum_style.clone(),
            spectrum_color: song.spectrum_color.clone(),
            spectrum_opacity: song.spectrum_opacity,
            copyright_text: song.copyright_text.clone(),
            logo_path: non_empty_path(&song.brand_logo_path),
            output_path: video_output_path(&self.paths, &song.title),
        };

        self.checkpoint(job, STEP_RENDER, 75, "Rendering video (this may take a few minutes)")
            .await;
        let output = self.composer.compose(&request).await?;

        job.output_path = output.to_string_lossy().into_owned();
        match tokio::fs::metadata(&output).await {
            Ok(meta) => job.output_size = meta.len() as i64,
            Err(e) => tracing::warn!(job_id = job.id, error = %e, "Could not stat rendered video"),
        }
        ctx.log.property("Output", &job.output_path);
        ctx.log.property("Output Size", job.output_size);
        ctx.log.success("Video rendering complete");

        self.checkpoint(job, STEP_RENDER, 90, "Video rendering complete").await;
        Ok(())
    }
}
