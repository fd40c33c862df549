//! Test harness: the real processor and worker over an in-memory database,
//! with fakes standing in for the analyzer script, ffmpeg and the image
//! services.

#![allow(dead_code)]

use async_trait::async_trait;
use lyricreel_common::config::{AnalysisConfig, RenderConfig, StoragePaths};
use lyricreel_common::db::{
    init_memory_database, JobRepository, SongRepository, SqliteJobRepository, SqliteSongRepository,
};
use lyricreel_common::models::{Job, Song};
use lyricreel_common::{Error, ProgressBroadcaster, Result};
use lyricreel_orchestrator::services::{
    image_filename, CommandOutput, CommandRunner, ProcessError, ScriptAudioAnalyzer, SectionImageGenerator,
};
use lyricreel_orchestrator::video::{RenderSettings, VideoComposer};
use lyricreel_orchestrator::{Processor, ProcessorDeps, QueueWorker};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const PYTHON: &str = "python3";

pub const THREE_SECTION_LYRICS: &str = "[Verse 1]\nWalking down the empty street\nNeon shadows at my feet\n\
[Chorus]\nWe are the light tonight\nBurning through the city bright\n\
[Verse 2]\nEchoes of a distant sound\nHeartbeat rising from the ground";

/// Analyzer document for a 30s, 120 BPM song with singing from 2.5s
pub fn analysis_success() -> serde_json::Value {
    let beats: Vec<f64> = (0..60).map(|i| i as f64 * 0.5).collect();
    json!({
        "duration_seconds": 30.0,
        "bpm": 120.0,
        "key": "A minor",
        "tempo": "Moderate",
        "genre": "synthwave",
        "beat_times": beats,
        "beat_count": 60,
        "vocal_segments": [{"start": 2.5, "end": 28.0, "duration": 25.5}],
        "vocal_segment_count": 1,
        "success": true
    })
}

pub fn analysis_failure(message: &str) -> serde_json::Value {
    json!({
        "success": false,
        "error": message,
        "error_type": "DecodeError"
    })
}

/// Plays the analyzer script (`python3`) and ffmpeg
///
/// ffmpeg calls create their output file (the last argument).
pub struct FakeRunner {
    analyzer_output: serde_json::Value,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeRunner {
    pub fn new(analyzer_output: serde_json::Value) -> Self {
        Self {
            analyzer_output,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ffmpeg_calls(&self) -> usize {
        self.calls().iter().filter(|(program, _)| program == "ffmpeg").count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _timeout: Duration,
    ) -> std::result::Result<CommandOutput, ProcessError> {
        self.calls.lock().unwrap().push((program.to_string(), args.to_vec()));

        if program == PYTHON {
            let success = self.analyzer_output["success"].as_bool().unwrap_or(false);
            return Ok(CommandOutput {
                exit_code: Some(if success { 0 } else { 1 }),
                stdout: self.analyzer_output.to_string(),
                stderr: String::new(),
            });
        }

        if let Some(output) = args.last() {
            if let Some(parent) = Path::new(output).parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(output, b"media").unwrap();
        }
        Ok(CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        })
    }
}

/// Writes a placeholder PNG per requested section image
#[derive(Default)]
pub struct FakeImageGenerator {
    pub requests: Mutex<Vec<(String, u32)>>,
    pub fail_with: Option<String>,
}

impl FakeImageGenerator {
    pub fn requests(&self) -> Vec<(String, u32)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SectionImageGenerator for FakeImageGenerator {
    async fn generate_for_section(
        &self,
        output_dir: &Path,
        section_type: &str,
        number: u32,
        _lyrics: &str,
        _style_keywords: &str,
    ) -> Result<PathBuf> {
        self.requests.lock().unwrap().push((section_type.to_string(), number));
        if let Some(message) = &self.fail_with {
            return Err(Error::external("image service", message.clone()));
        }
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(image_filename(section_type, number));
        std::fs::write(&path, b"png")?;
        Ok(path)
    }
}

/// Job repository that records a snapshot of every update
pub struct RecordingJobRepository {
    inner: SqliteJobRepository,
    updates: Mutex<Vec<Job>>,
}

impl RecordingJobRepository {
    pub fn updates(&self) -> Vec<Job> {
        self.updates.lock().unwrap().clone()
    }

    pub fn sqlite(&self) -> &SqliteJobRepository {
        &self.inner
    }
}

#[async_trait]
impl JobRepository for RecordingJobRepository {
    async fn get_next_pending(&self) -> Result<Option<Job>> {
        self.inner.get_next_pending().await
    }

    async fn get(&self, id: i64) -> Result<Option<Job>> {
        self.inner.get(id).await
    }

    async fn update(&self, job: &Job) -> Result<()> {
        self.updates.lock().unwrap().push(job.clone());
        self.inner.update(job).await
    }

    async fn enqueue(&self, song_id: i64, priority: i32) -> Result<Job> {
        self.inner.enqueue(song_id, priority).await
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub paths: StoragePaths,
    pub jobs: Arc<RecordingJobRepository>,
    pub songs: Arc<SqliteSongRepository>,
    pub broadcaster: ProgressBroadcaster,
    pub runner: Arc<FakeRunner>,
    pub images: Arc<FakeImageGenerator>,
}

impl Harness {
    pub async fn new(analyzer_output: serde_json::Value) -> Self {
        Self::with_images(analyzer_output, FakeImageGenerator::default()).await
    }

    pub async fn with_images(analyzer_output: serde_json::Value, images: FakeImageGenerator) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = StoragePaths::new(dir.path().join("root"));
        paths.ensure_directories().unwrap();

        let pool = init_memory_database().await.unwrap();
        Self {
            dir,
            paths,
            jobs: Arc::new(RecordingJobRepository {
                inner: SqliteJobRepository::new(pool.clone()),
                updates: Mutex::new(Vec::new()),
            }),
            songs: Arc::new(SqliteSongRepository::new(pool)),
            broadcaster: ProgressBroadcaster::new(),
            runner: Arc::new(FakeRunner::new(analyzer_output)),
            images: Arc::new(images),
        }
    }

    pub fn processor(&self) -> Processor {
        self.processor_with_songs(self.songs.clone())
    }

    /// Processor that reloads songs from `songs` instead of the harness store
    pub fn processor_with_songs(&self, songs: Arc<dyn SongRepository>) -> Processor {
        let analysis = AnalysisConfig {
            python_path: PYTHON.to_string(),
            ..AnalysisConfig::default()
        };
        Processor::new(ProcessorDeps {
            jobs: self.jobs.clone(),
            songs,
            broadcaster: self.broadcaster.clone(),
            analyzer: Arc::new(ScriptAudioAnalyzer::new(self.runner.clone(), &analysis)),
            images: self.images.clone(),
            composer: VideoComposer::new(
                self.runner.clone(),
                RenderSettings::from_config(&RenderConfig::default(), &self.paths),
            ),
            paths: self.paths.clone(),
        })
    }

    pub fn worker(&self) -> QueueWorker {
        QueueWorker::new(
            self.jobs.clone(),
            self.songs.clone(),
            self.processor(),
            self.broadcaster.clone(),
            Duration::from_millis(50),
        )
    }

    /// Insert a song whose music stem exists on disk
    pub async fn insert_song(&self, title: &str, lyrics: &str) -> Song {
        let stem_dir = self.dir.path().join("stems");
        std::fs::create_dir_all(&stem_dir).unwrap();
        let music = stem_dir.join(format!("{}.wav", title.replace(' ', "_")));
        std::fs::write(&music, b"RIFF").unwrap();

        let mut song = Song {
            title: title.to_string(),
            artist_name: "Test Artist".to_string(),
            music_stem_path: music.to_string_lossy().into_owned(),
            lyrics: lyrics.to_string(),
            ..Default::default()
        };
        song.id = self.songs.insert(&song).await.unwrap();
        song
    }

    pub async fn job(&self, id: i64) -> Job {
        self.jobs.get(id).await.unwrap().expect("job exists")
    }

    pub async fn song(&self, id: i64) -> Song {
        self.songs.get_by_id(id).await.unwrap().expect("song exists")
    }
}
