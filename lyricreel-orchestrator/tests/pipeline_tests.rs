//! End-to-end worker runs: queue → five phases → terminal job state

mod helpers;

use async_trait::async_trait;
use helpers::*;
use lyricreel_common::db::{JobRepository, SongRepository};
use lyricreel_common::models::{JobStatus, Song};
use lyricreel_common::progress::SUBSCRIBER_BUFFER;
use lyricreel_common::Result;
use lyricreel_orchestrator::lyrics::Section;
use lyricreel_orchestrator::{QueueWorker, WorkerOutcome};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn tc_pipeline_001_job_completes_with_rendered_video() {
    // Given: a song with three marked sections and a music stem
    let h = Harness::new(analysis_success()).await;
    let song = h.insert_song("Neon Nights", THREE_SECTION_LYRICS).await;
    let job = h.jobs.enqueue(song.id, 0).await.unwrap();

    // When
    let outcome = h.worker().process_next().await;

    // Then: completed with the video recorded on the job
    assert_eq!(outcome, WorkerOutcome::Completed(job.id));
    let done = h.job(job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert_eq!(done.current_step, "Completed");
    assert!(done.error_message.is_empty());
    assert_eq!(
        done.output_path,
        h.paths.videos_dir().join("Neon_Nights.mp4").to_string_lossy()
    );
    assert_eq!(done.output_size, 5);
    assert!(done.completed_at.is_some());

    // And: one image per section, 3 clips + xfade + 4 stages
    assert_eq!(
        h.images.requests(),
        vec![("verse".to_string(), 1), ("chorus".to_string(), 1), ("verse".to_string(), 2)]
    );
    assert_eq!(h.runner.ffmpeg_calls(), 8);

    let log = h.paths.logs_dir().join(job.id.to_string()).join("render.log");
    let log = std::fs::read_to_string(log).unwrap();
    assert!(log.contains("RENDER COMPLETED SUCCESSFULLY"));
}

#[tokio::test]
async fn tc_pipeline_002_progress_never_decreases() {
    let h = Harness::new(analysis_success()).await;
    let song = h.insert_song("Neon Nights", THREE_SECTION_LYRICS).await;
    h.jobs.enqueue(song.id, 0).await.unwrap();

    h.worker().process_next().await;

    let updates = h.jobs.updates();
    let progress: Vec<i32> = updates.iter().map(|j| j.progress).collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));

    // Every phase reported its closing checkpoint
    for (step, value) in [
        ("Analyzing audio", 20),
        ("Processing lyrics", 30),
        ("Generating images", 50),
        ("Rendering video", 90),
        ("Publishing video", 100),
    ] {
        assert!(
            updates.iter().any(|j| j.current_step == step && j.progress == value),
            "missing checkpoint {} {}",
            step,
            value
        );
    }
}

#[tokio::test]
async fn tc_pipeline_003_analysis_and_lyrics_are_written_back() {
    let h = Harness::new(analysis_success()).await;
    let song = h.insert_song("Neon Nights", THREE_SECTION_LYRICS).await;
    h.jobs.enqueue(song.id, 0).await.unwrap();

    h.worker().process_next().await;

    let stored = h.song(song.id).await;
    assert_eq!(stored.bpm, 120.0);
    assert_eq!(stored.key, "A minor");
    assert_eq!(stored.tempo, "Moderate");
    assert_eq!(stored.duration_seconds, 30.0);
    assert_eq!(stored.genre, "synthwave");
    assert_eq!(stored.vocal_onset(), Some(2.5));

    let sections: Vec<Section> = serde_json::from_str(&stored.lyrics_sections).unwrap();
    assert_eq!(sections.len(), 3);
    assert_eq!(sections[1].lines, vec!["We are the light tonight", "Burning through the city bright"]);

    let display: Vec<serde_json::Value> = serde_json::from_str(&stored.lyrics_display).unwrap();
    assert_eq!(display.len(), 6);
    assert_eq!(display[5]["end_time"], 30.0);
}

#[tokio::test]
async fn tc_pipeline_004_repeated_chorus_shares_one_image() {
    // Given: the chorus appears twice
    let lyrics = format!(
        "{}\n[Chorus]\nWe are the light tonight\nBurning through the city bright",
        THREE_SECTION_LYRICS
    );
    let h = Harness::new(analysis_success()).await;
    let song = h.insert_song("Neon Nights", &lyrics).await;
    let job = h.jobs.enqueue(song.id, 0).await.unwrap();

    // When
    let outcome = h.worker().process_next().await;

    // Then: three generations, four clips
    assert_eq!(outcome, WorkerOutcome::Completed(job.id));
    assert_eq!(h.images.requests().len(), 3);
    assert_eq!(h.runner.ffmpeg_calls(), 4 + 1 + 4);
}

#[tokio::test]
async fn tc_pipeline_005_analyzer_failure_stops_the_run() {
    // Given: the analyzer reports success=false
    let h = Harness::new(analysis_failure("Audio file is corrupted or unreadable")).await;
    let song = h.insert_song("Broken", THREE_SECTION_LYRICS).await;
    let job = h.jobs.enqueue(song.id, 0).await.unwrap();

    // When
    let outcome = h.worker().process_next().await;

    // Then: failed with the analyzer's own text, nothing after analysis ran
    assert_eq!(outcome, WorkerOutcome::Failed(job.id));
    let failed = h.job(job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message, "Audio file is corrupted or unreadable");
    assert_eq!(failed.retry_count, 1);
    assert!(failed.output_path.is_empty());
    assert!(failed.progress <= 20);

    assert!(h.images.requests().is_empty());
    assert_eq!(h.runner.ffmpeg_calls(), 0);
    assert_eq!(h.runner.calls().len(), 1);
    assert_eq!(h.song(song.id).await.bpm, 0.0);
}

#[tokio::test]
async fn tc_pipeline_006_image_failure_keeps_earlier_writes() {
    let images = FakeImageGenerator {
        fail_with: Some("image API error 503: busy".to_string()),
        ..Default::default()
    };
    let h = Harness::with_images(analysis_success(), images).await;
    let song = h.insert_song("Neon Nights", THREE_SECTION_LYRICS).await;
    let job = h.jobs.enqueue(song.id, 0).await.unwrap();

    let outcome = h.worker().process_next().await;

    assert_eq!(outcome, WorkerOutcome::Failed(job.id));
    assert_eq!(h.job(job.id).await.error_message, "image API error 503: busy");
    assert_eq!(h.images.requests().len(), 1);
    assert_eq!(h.runner.ffmpeg_calls(), 0);
    // Analysis and lyrics writes are independent of later phases
    let stored = h.song(song.id).await;
    assert_eq!(stored.bpm, 120.0);
    assert!(!stored.lyrics_sections.is_empty());
}

#[tokio::test]
async fn tc_pipeline_007_stored_analysis_is_reused() {
    // Given: the song was analyzed by an earlier run
    let h = Harness::new(analysis_failure("must not be called")).await;
    let mut song = h.insert_song("Neon Nights", THREE_SECTION_LYRICS).await;
    song.bpm = 96.0;
    song.key = "E major".to_string();
    song.duration_seconds = 24.0;
    h.songs.update(&song).await.unwrap();
    let job = h.jobs.enqueue(song.id, 0).await.unwrap();

    // When
    let outcome = h.worker().process_next().await;

    // Then: no analyzer call, lines spread evenly over the stored duration
    assert_eq!(outcome, WorkerOutcome::Completed(job.id));
    assert!(h.runner.calls().iter().all(|(program, _)| program != PYTHON));
    let display: Vec<serde_json::Value> =
        serde_json::from_str(&h.song(song.id).await.lyrics_display).unwrap();
    assert_eq!(display[1]["start_time"], 4.0);
}

#[tokio::test]
async fn tc_pipeline_008_higher_priority_job_runs_first() {
    let h = Harness::new(analysis_success()).await;
    let first = h.insert_song("First", THREE_SECTION_LYRICS).await;
    let urgent = h.insert_song("Urgent", THREE_SECTION_LYRICS).await;
    h.jobs.enqueue(first.id, 0).await.unwrap();
    let urgent_job = h.jobs.enqueue(urgent.id, 5).await.unwrap();

    let worker = h.worker();
    assert_eq!(worker.process_next().await, WorkerOutcome::Completed(urgent_job.id));
    assert!(matches!(worker.process_next().await, WorkerOutcome::Completed(id) if id != urgent_job.id));
    assert_eq!(worker.process_next().await, WorkerOutcome::Idle);
}

#[tokio::test]
async fn tc_pipeline_009_full_mailbox_drops_without_blocking() {
    // Given: a subscriber that never reads
    let h = Harness::new(analysis_success()).await;
    let mut subscription = h.broadcaster.subscribe();
    let song = h.insert_song("Neon Nights", THREE_SECTION_LYRICS).await;
    h.jobs.enqueue(song.id, 0).await.unwrap();

    // When: the run broadcasts far more updates than the mailbox holds
    let outcome = tokio::time::timeout(Duration::from_secs(30), h.worker().process_next())
        .await
        .expect("run must not block on a full mailbox");

    // Then: the oldest updates were kept, the rest dropped
    assert!(matches!(outcome, WorkerOutcome::Completed(_)));
    let mut received = Vec::new();
    while let Some(update) = subscription.try_recv() {
        received.push(update);
    }
    assert_eq!(received.len(), SUBSCRIBER_BUFFER);
    assert_eq!(received[0].message, "Processing started");
    assert_eq!(received[0].status, JobStatus::Processing);
    assert_eq!(received[1].message, "Loading audio files");
}

/// Song store that has lost every record
struct EmptySongs;

#[async_trait]
impl SongRepository for EmptySongs {
    async fn get_by_id(&self, _id: i64) -> Result<Option<Song>> {
        Ok(None)
    }

    async fn update(&self, _song: &Song) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, _song: &Song) -> Result<i64> {
        Ok(0)
    }
}

#[tokio::test]
async fn tc_pipeline_010_missing_song_fails_job() {
    let h = Harness::new(analysis_success()).await;
    let song = h.insert_song("Ghost", THREE_SECTION_LYRICS).await;
    let job = h.jobs.enqueue(song.id, 0).await.unwrap();
    let mut subscription = h.broadcaster.subscribe();
    let worker = QueueWorker::new(
        h.jobs.clone(),
        Arc::new(EmptySongs),
        h.processor(),
        h.broadcaster.clone(),
        Duration::from_millis(50),
    );

    let outcome = worker.process_next().await;

    assert_eq!(outcome, WorkerOutcome::Failed(job.id));
    let failed = h.job(job.id).await;
    assert_eq!(failed.error_message, "Song not found");
    let update = subscription.try_recv().unwrap();
    assert_eq!(update.message, "Processing failed");
    assert_eq!(update.error_message.as_deref(), Some("Song not found"));
    assert!(h.runner.calls().is_empty());
}

#[tokio::test]
async fn tc_pipeline_011_stop_ends_the_poll_loop() {
    // Given: a running worker with one queued job
    let h = Harness::new(analysis_success()).await;
    let song = h.insert_song("Neon Nights", THREE_SECTION_LYRICS).await;
    let job = h.jobs.enqueue(song.id, 0).await.unwrap();
    let worker = h.worker();
    let stop = worker.cancellation_token();
    let handle = worker.spawn();

    // When: the first tick has had time to run the job
    for _ in 0..100 {
        if h.job(job.id).await.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    stop.cancel();

    // Then
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker exits after stop")
        .unwrap();
    assert_eq!(h.job(job.id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn tc_pipeline_012_song_deleted_mid_run_fails_job() {
    // Given: the worker still sees the song, but it is gone when the run reloads it
    let h = Harness::new(analysis_success()).await;
    let song = h.insert_song("Ghost", THREE_SECTION_LYRICS).await;
    let job = h.jobs.enqueue(song.id, 0).await.unwrap();
    let worker = QueueWorker::new(
        h.jobs.clone(),
        h.songs.clone(),
        h.processor_with_songs(Arc::new(EmptySongs)),
        h.broadcaster.clone(),
        Duration::from_millis(50),
    );

    // When
    let outcome = worker.process_next().await;

    // Then: failed with the bare not-found message and no work started
    assert_eq!(outcome, WorkerOutcome::Failed(job.id));
    let failed = h.job(job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message, format!("Song {} not found", song.id));
    assert!(h.runner.calls().is_empty());
    assert!(!h.paths.logs_dir().join(job.id.to_string()).exists());
}
