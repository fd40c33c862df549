//! Audio analysis client
//!
//! BPM, key, beat grid and vocal segments come from an external analysis
//! script that prints one JSON document on stdout and exits non-zero when
//! `success` is false.

use super::process::CommandRunner;
use async_trait::async_trait;
use lyricreel_common::config::AnalysisConfig;
use lyricreel_common::models::VocalSegment;
use lyricreel_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "audio analyzer";

/// Analyzer output document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioAnalysis {
    pub duration_seconds: f64,
    pub bpm: f64,
    pub key: String,
    pub tempo: String,
    pub genre: String,
    pub beat_times: Vec<f64>,
    pub beat_count: usize,
    pub vocal_segments: Vec<VocalSegment>,
    pub vocal_segment_count: usize,
    pub spectral_centroid: f64,
    pub zero_crossing_rate: f64,
    pub sample_rate: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_type: String,
}

impl AudioAnalysis {
    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "Duration: {:.1}s | BPM: {:.1} ({}) | Key: {} | Beats: {} | Vocal Segments: {}",
            self.duration_seconds,
            self.bpm,
            self.tempo,
            self.key,
            self.beat_count,
            self.vocal_segment_count
        )
    }

    /// Vocal segment listing, one line per segment
    pub fn vocal_timing_info(&self) -> String {
        if self.vocal_segments.is_empty() {
            return "No vocal segments detected".to_string();
        }
        let mut info = format!("Found {} vocal segments:\n", self.vocal_segments.len());
        for (i, seg) in self.vocal_segments.iter().enumerate() {
            info.push_str(&format!(
                "  Segment {}: {:.2}s - {:.2}s ({:.2}s duration)\n",
                i + 1,
                seg.start,
                seg.end,
                seg.duration
            ));
        }
        info
    }

    /// Vocal segments as stored on the song (`vocal_timing` column)
    pub fn vocal_timing_json(&self) -> Result<String> {
        serde_json::to_string(&self.vocal_segments)
            .map_err(|e| Error::Internal(format!("serialize vocal segments: {}", e)))
    }
}

/// Audio analysis seam used by the processor
#[async_trait]
pub trait AudioAnalyzer: Send + Sync {
    async fn analyze(&self, audio_path: &Path) -> Result<AudioAnalysis>;
}

/// Runs `<python> <script> <audio>` through a [`CommandRunner`]
pub struct ScriptAudioAnalyzer {
    runner: Arc<dyn CommandRunner>,
    python_path: String,
    script_path: String,
    timeout: Duration,
}

impl ScriptAudioAnalyzer {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &AnalysisConfig) -> Self {
        Self {
            runner,
            python_path: config.python_path.clone(),
            script_path: config.script_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl AudioAnalyzer for ScriptAudioAnalyzer {
    async fn analyze(&self, audio_path: &Path) -> Result<AudioAnalysis> {
        if !audio_path.exists() {
            return Err(Error::Validation(format!(
                "audio file not found: {}",
                audio_path.display()
            )));
        }

        tracing::debug!(
            audio_file = %audio_path.display(),
            script = %self.script_path,
            "Running audio analysis"
        );

        let args = vec![
            self.script_path.clone(),
            audio_path.to_string_lossy().into_owned(),
        ];
        let output = self
            .runner
            .run(&self.python_path, &args, self.timeout)
            .await
            .map_err(|e| e.into_external(SERVICE))?;

        parse_analysis_output(output.exit_code, &output.stdout, &output.combined())
    }
}

/// Interpret analyzer stdout; a parsed `success: false` document wins over the exit code
fn parse_analysis_output(exit_code: Option<i32>, stdout: &str, combined: &str) -> Result<AudioAnalysis> {
    let analysis: AudioAnalysis = match serde_json::from_str(stdout.trim()) {
        Ok(analysis) => analysis,
        Err(e) if exit_code == Some(0) => {
            return Err(Error::external(
                SERVICE,
                format!("failed to parse analyzer output: {}, raw output: {}", e, stdout.trim()),
            ));
        }
        Err(_) => {
            return Err(Error::external(
                SERVICE,
                format!("analyzer script failed: exit code {:?}, output: {}", exit_code, combined.trim()),
            ));
        }
    };

    if !analysis.success {
        let message = if analysis.error.is_empty() {
            format!("audio analysis failed ({})", analysis.error_type)
        } else {
            analysis.error.clone()
        };
        return Err(Error::external(SERVICE, message));
    }

    tracing::info!(summary = %analysis.summary(), "Audio analysis completed");
    Ok(analysis)
}
