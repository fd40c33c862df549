//! Video composition engine
//!
//! Renders a lyric video through five sequential ffmpeg invocations:
//!
//! 1. image slideshow with crossfades
//! 2. audio spectrum overlay (audio becomes input 1)
//! 3. metadata and branding text, optional logo
//! 4. lyric overlay (karaoke ASS track, synthesized cues, or stream copy)
//! 5. audio mux and final encode into the output path
//!
//! Each stage writes a new temp file and removes the previous one once it has
//! been consumed. Nothing is written to the output path until stage 5.

pub mod overlay;
pub mod slideshow;
pub mod spectrum;
pub mod text;

pub use slideshow::{crossfade_plan, CrossfadePlan, PlannedClip};
pub use spectrum::{SpectrumColor, SpectrumStyle};
pub use text::{escape_drawtext, sanitize_text, wrap_lyric_line};

use crate::services::process::CommandRunner;
use lyricreel_common::config::{RenderConfig, StoragePaths};
use lyricreel_common::{Error, Result};
use overlay::MetadataText;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "ffmpeg";

/// Filter graphs longer than this go through `-filter_complex_script`
const MAX_INLINE_FILTER_LEN: usize = 100_000;

/// Background image shown over `[start_time, end_time)` seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSegment {
    pub image_path: PathBuf,
    pub start_time: f64,
    pub end_time: f64,
}

/// Lyric cue relative to the first vocal onset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// Everything needed to render one song
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub audio_path: PathBuf,
    pub duration: f64,
    pub images: Vec<ImageSegment>,
    pub lyrics: Vec<LyricLine>,
    pub vocal_onset: f64,
    /// Karaoke ASS track; used instead of synthesized cues when the file exists
    pub subtitle_path: Option<PathBuf>,
    pub key: String,
    pub tempo: String,
    pub bpm: f64,
    pub title: String,
    pub artist: String,
    pub spectrum_style: String,
    pub spectrum_color: String,
    pub spectrum_opacity: f64,
    /// Overrides the settings' copyright line when non-empty
    pub copyright_text: String,
    /// Overrides the settings' logo
    pub logo_path: Option<PathBuf>,
    pub output_path: PathBuf,
}

/// Composer-wide settings
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub crossfade: f64,
    pub temp_dir: PathBuf,
    pub logo_path: Option<PathBuf>,
    pub copyright_text: String,
    pub ffmpeg_path: String,
    /// Upper bound for each ffmpeg invocation
    pub stage_timeout: Duration,
}

impl RenderSettings {
    pub fn from_config(config: &RenderConfig, paths: &StoragePaths) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            crossfade: if config.crossfade_secs > 0.0 { config.crossfade_secs } else { 2.0 },
            temp_dir: paths.temp_dir(),
            logo_path: Some(paths.branding_dir().join("artist-logo.png")),
            copyright_text: config.copyright_text.clone(),
            ffmpeg_path: config.ffmpeg_path.clone(),
            stage_timeout: Duration::from_secs(config.stage_timeout_secs),
        }
    }
}

/// Sequences ffmpeg invocations through a [`CommandRunner`]
pub struct VideoComposer {
    runner: Arc<dyn CommandRunner>,
    settings: RenderSettings,
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn remove_temp(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(path = %path.display(), error = %e, "Could not remove temp file");
        }
    }
}

impl VideoComposer {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: RenderSettings) -> Self {
        Self { runner, settings }
    }

    /// Run all five stages; returns the output path
    pub async fn compose(&self, request: &RenderRequest) -> Result<PathBuf> {
        if request.images.is_empty() {
            return Err(Error::Validation("no image segments to render".to_string()));
        }
        if request.duration <= 0.0 {
            return Err(Error::Validation(format!(
                "invalid render duration: {:.2}",
                request.duration
            )));
        }

        tokio::fs::create_dir_all(&self.settings.temp_dir).await?;
        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let started = std::time::Instant::now();

        tracing::info!(output = %request.output_path.display(), "Step 1/5: Creating image slideshow");
        let slideshow = self.temp_path("slideshow", request);
        self.build_slideshow(request, &slideshow).await?;

        tracing::info!("Step 2/5: Adding spectrum analyzer overlay");
        let spectrum = self.temp_path("spectrum", request);
        self.add_spectrum(request, &slideshow, &spectrum).await?;

        tracing::info!("Step 3/5: Adding metadata and branding overlays");
        let metadata = self.temp_path("metadata", request);
        self.add_metadata(request, &spectrum, &metadata).await?;

        tracing::info!("Step 4/5: Adding lyrics overlay");
        let lyrics = self.temp_path("lyrics", request);
        self.add_lyrics(request, &metadata, &lyrics).await?;

        tracing::info!("Step 5/5: Adding audio and encoding final video");
        let final_args = vec![
            "-i".to_string(),
            path_arg(&lyrics),
            "-i".to_string(),
            path_arg(&request.audio_path),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-crf".into(),
            "23".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
            "-shortest".into(),
            "-y".into(),
            path_arg(&request.output_path),
        ];
        self.run_stage("final encode", final_args, Some(&lyrics), &request.output_path)
            .await?;

        tracing::info!(
            output = %request.output_path.display(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Video rendered"
        );
        Ok(request.output_path.clone())
    }

    /// Mix vocal and music stems into one WAV (`amix`, equal weights)
    pub async fn mix_stems(&self, vocal: &Path, music: &Path, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mix_args = vec![
            "-i".to_string(),
            path_arg(vocal),
            "-i".to_string(),
            path_arg(music),
            "-filter_complex".into(),
            "[0:a][1:a]amix=inputs=2:duration=longest:weights=1.0 1.0".into(),
            "-c:a".into(),
            "pcm_s16le".into(),
            "-y".into(),
            path_arg(output),
        ];
        self.run_stage("audio mix", mix_args, None, output).await
    }

    fn temp_path(&self, stage: &str, request: &RenderRequest) -> PathBuf {
        self.settings
            .temp_dir
            .join(format!("{}_{}.mp4", stage, output_stem(&request.output_path)))
    }

    /// Run one ffmpeg invocation; `consumed` is removed afterwards either way,
    /// `output` is removed on failure
    async fn run_stage(&self, stage: &str, args: Vec<String>, consumed: Option<&Path>, output: &Path) -> Result<()> {
        tracing::debug!(stage, args = ?args, "Running ffmpeg");
        let result = self
            .runner
            .run(&self.settings.ffmpeg_path, &args, self.settings.stage_timeout)
            .await;

        if let Some(consumed) = consumed {
            remove_temp(consumed).await;
        }

        let failure = match result {
            Ok(out) if out.success() => return Ok(()),
            Ok(out) => format!(
                "ffmpeg {} failed (exit code {:?})\nOutput: {}",
                stage,
                out.exit_code,
                out.combined()
            ),
            Err(e) => format!("ffmpeg {} failed: {}", stage, e),
        };
        remove_temp(output).await;
        Err(Error::external(SERVICE, failure))
    }

    async fn build_slideshow(&self, request: &RenderRequest, output: &Path) -> Result<()> {
        let s = &self.settings;

        if request.images.len() == 1 {
            let clip = slideshow::still_clip_args(
                &path_arg(&request.images[0].image_path),
                request.duration,
                s.width,
                s.height,
                s.fps,
                &path_arg(output),
            );
            return self.run_stage("slideshow", clip, None, output).await;
        }

        let plan = crossfade_plan(&request.images, s.crossfade);
        if plan.clips.is_empty() {
            return Err(Error::Validation("no image segment has a positive duration".to_string()));
        }

        let mut clip_paths: Vec<PathBuf> = Vec::with_capacity(plan.clips.len());
        for clip in &plan.clips {
            let clip_path = s
                .temp_dir
                .join(format!("segment_{}_{}.mp4", clip.segment, output_stem(output)));
            let clip_args = slideshow::still_clip_args(
                &path_arg(&request.images[clip.segment].image_path),
                clip.duration,
                s.width,
                s.height,
                s.fps,
                &path_arg(&clip_path),
            );
            if let Err(e) = self.run_stage("slideshow clip", clip_args, None, &clip_path).await {
                for done in &clip_paths {
                    remove_temp(done).await;
                }
                return Err(e);
            }
            clip_paths.push(clip_path);
        }

        let mut join_args = Vec::new();
        for clip_path in &clip_paths {
            join_args.push("-i".to_string());
            join_args.push(path_arg(clip_path));
        }
        if clip_paths.len() == 1 {
            join_args.extend(args(&["-c", "copy", "-y"]));
        } else {
            join_args.push("-filter_complex".into());
            join_args.push(slideshow::xfade_filter(&plan.offsets, s.crossfade));
            join_args.extend(args(&[
                "-map", "[outv]", "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p", "-r",
            ]));
            join_args.push(s.fps.to_string());
            join_args.push("-y".into());
        }
        join_args.push(path_arg(output));

        let result = self.run_stage("slideshow", join_args, None, output).await;
        for clip_path in &clip_paths {
            remove_temp(clip_path).await;
        }
        result
    }

    async fn add_spectrum(&self, request: &RenderRequest, input: &Path, output: &Path) -> Result<()> {
        let style = SpectrumStyle::from_name(&request.spectrum_style);
        let color = SpectrumColor::from_name(&request.spectrum_color);
        let opacity = spectrum::normalize_opacity(request.spectrum_opacity);
        let graph = spectrum::spectrum_filter(style, &color, opacity, self.settings.width, self.settings.height);
        tracing::debug!(%style, ?color, opacity, "Spectrum overlay");

        let mut stage_args = vec![
            "-i".to_string(),
            path_arg(input),
            "-i".to_string(),
            path_arg(&request.audio_path),
            "-filter_complex".into(),
            graph,
        ];
        stage_args.extend(args(&[
            "-map", "[outv]", "-map", "1:a", "-c:v", "libx264", "-c:a", "aac", "-b:a", "192k", "-preset",
            "medium", "-crf", "23", "-t",
        ]));
        stage_args.push(format!("{:.2}", request.duration));
        stage_args.push("-y".into());
        stage_args.push(path_arg(output));

        self.run_stage("spectrum overlay", stage_args, Some(input), output).await
    }

    async fn add_metadata(&self, request: &RenderRequest, input: &Path, output: &Path) -> Result<()> {
        let copyright = if request.copyright_text.trim().is_empty() {
            self.settings.copyright_text.as_str()
        } else {
            request.copyright_text.as_str()
        };
        let text_filter = overlay::metadata_filter(&MetadataText {
            key: &request.key,
            tempo: &request.tempo,
            bpm: request.bpm,
            title: &request.title,
            copyright,
        });

        let logo = request.logo_path.as_ref().or(self.settings.logo_path.as_ref());
        let logo = match logo {
            Some(path) if path.is_file() => Some(path),
            Some(path) => {
                tracing::warn!(logo = %path.display(), "Logo not found, rendering without it");
                None
            }
            None => None,
        };

        let mut stage_args = vec!["-i".to_string(), path_arg(input)];
        match logo {
            Some(logo) => {
                stage_args.push("-i".into());
                stage_args.push(path_arg(logo));
                stage_args.push("-filter_complex".into());
                stage_args.push(overlay::logo_filter_complex(&text_filter));
                stage_args.extend(args(&["-map", "[vout]", "-map", "0:a?"]));
            }
            None => {
                stage_args.push("-vf".into());
                stage_args.push(text_filter);
            }
        }
        stage_args.extend(args(&["-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "copy", "-y"]));
        stage_args.push(path_arg(output));

        self.run_stage("metadata overlay", stage_args, Some(input), output).await
    }

    async fn add_lyrics(&self, request: &RenderRequest, input: &Path, output: &Path) -> Result<()> {
        let mut stage_args = vec!["-i".to_string(), path_arg(input)];

        if let Some(ass) = request.subtitle_path.as_ref().filter(|p| p.is_file()) {
            tracing::info!(subtitles = %ass.display(), "Using karaoke subtitle track");
            stage_args.push("-vf".into());
            stage_args.push(format!("subtitles={}", path_arg(ass)));
            stage_args.extend(args(&["-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "copy", "-y"]));
            stage_args.push(path_arg(output));
            return self.run_stage("lyrics overlay", stage_args, Some(input), output).await;
        }

        let lines = overlay::display_lines(&request.lyrics, request.vocal_onset);
        if lines.is_empty() {
            stage_args.extend(args(&["-c", "copy", "-y"]));
            stage_args.push(path_arg(output));
            return self.run_stage("lyrics overlay", stage_args, Some(input), output).await;
        }

        tracing::info!(display_lines = lines.len(), "Building lyric cues");
        let filter = overlay::lyrics_filter(&lines, request.vocal_onset, self.settings.height);

        let script = if filter.len() > MAX_INLINE_FILTER_LEN {
            let script = self
                .settings
                .temp_dir
                .join(format!("lyrics_filter_{}.txt", output_stem(output)));
            tokio::fs::write(&script, &filter).await?;
            tracing::info!(filter_len = filter.len(), "Using filter script for lyrics overlay");
            stage_args.push("-filter_complex_script".into());
            stage_args.push(path_arg(&script));
            Some(script)
        } else {
            stage_args.push("-vf".into());
            stage_args.push(filter);
            None
        };
        stage_args.extend(args(&["-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "copy", "-y"]));
        stage_args.push(path_arg(output));

        let result = self.run_stage("lyrics overlay", stage_args, Some(input), output).await;
        if let Some(script) = script {
            remove_temp(&script).await;
        }
        result
    }
}

fn output_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "render".to_string())
}
