//! Per-job human-readable render log
//!
//! Written to `<root>/logs/<job_id>/render.log`, replaced on each run. The log
//! is a convenience for operators: any I/O failure disables it with a warning
//! and never affects the job.
//!
//! Records are handed to a writer task over a channel, so logging from a
//! phase never blocks the runtime on file I/O. [`RenderLog::close`] waits for
//! the writer to drain.

use chrono::{DateTime, Local};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const RULE: &str = "================================================================================";

pub struct RenderLog {
    path: Option<PathBuf>,
    tx: Option<mpsc::UnboundedSender<String>>,
    writer: Option<JoinHandle<()>>,
    started: Instant,
    started_at: DateTime<Local>,
}

impl RenderLog {
    /// Log that writes nothing
    pub fn disabled() -> Self {
        Self {
            path: None,
            tx: None,
            writer: None,
            started: Instant::now(),
            started_at: Local::now(),
        }
    }

    /// Create `logs_dir/<job_id>/render.log`, truncating any previous run
    pub async fn create(logs_dir: &Path, job_id: i64, song_id: i64) -> Self {
        let dir = logs_dir.join(job_id.to_string());
        let path = dir.join("render.log");

        let file = match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => File::create(&path).await,
            Err(e) => Err(e),
        };
        let file = match file {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(job_id, path = %path.display(), error = %e, "Render log disabled");
                return Self::disabled();
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_records(file, rx, path.clone()));
        let log = Self {
            path: Some(path),
            tx: Some(tx),
            writer: Some(writer),
            started: Instant::now(),
            started_at: Local::now(),
        };
        log.write_raw(format!(
            "{rule}\nLYRICREEL - VIDEO RENDER LOG\nJob ID: {job}\nSong ID: {song}\nStarted: {at}\n{rule}\n\n",
            rule = RULE,
            job = job_id,
            song = song_id,
            at = log.started_at.format("%Y-%m-%d %H:%M:%S %Z"),
        ));
        log
    }

    /// File being written; `None` when the log is disabled
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn elapsed(&self) -> String {
        format!("{:.3}s", self.started.elapsed().as_secs_f64())
    }

    fn write_raw(&self, text: String) {
        if let Some(tx) = &self.tx {
            // Send only fails once the writer has given up; it already warned
            let _ = tx.send(text);
        }
    }

    fn record(&self, level: &str, message: impl Display) {
        self.write_raw(format!("[{}] {}: {}\n", self.elapsed(), level, message));
    }

    pub fn phase(&self, name: &str, description: &str) {
        let mut text = format!("\n[{}] ========== PHASE: {} ==========\n", self.elapsed(), name);
        if !description.is_empty() {
            text.push_str(&format!("Description: {}\n", description));
        }
        text.push('\n');
        self.write_raw(text);
    }

    pub fn property(&self, key: &str, value: impl Display) {
        self.write_raw(format!("[{}] PROPERTY: {} = {}\n", self.elapsed(), key, value));
    }

    pub fn info(&self, message: impl Display) {
        self.record("INFO", message);
    }

    pub fn success(&self, message: impl Display) {
        self.record("SUCCESS", message);
    }

    pub fn error(&self, message: impl Display) {
        self.record("ERROR", message);
    }

    /// Write the footer, close the channel and wait for the file to be flushed
    ///
    /// Later records are dropped.
    pub async fn close(&mut self, success: bool, message: &str) {
        let status = if success { "COMPLETED SUCCESSFULLY" } else { "FAILED" };
        self.write_raw(format!(
            "\n{rule}\nRENDER {status}\nDuration: {elapsed}\nCompleted: {at}\n{message}\n{rule}\n",
            rule = RULE,
            status = status,
            elapsed = self.elapsed(),
            at = Local::now().format("%Y-%m-%d %H:%M:%S %Z"),
            message = message,
        ));

        self.tx = None;
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                tracing::warn!(error = %e, "Render log writer task failed");
            }
        }
    }
}

/// Drain records into `file` until every sender is gone
async fn write_records(mut file: File, mut rx: mpsc::UnboundedReceiver<String>, path: PathBuf) {
    while let Some(text) = rx.recv().await {
        if let Err(e) = file.write_all(text.as_bytes()).await {
            tracing::warn!(path = %path.display(), error = %e, "Render log write failed, disabling");
            return;
        }
    }
    if let Err(e) = file.flush().await {
        tracing::warn!(path = %path.display(), error = %e, "Render log flush failed");
    }
}
