//! Timed-line aligner
//!
//! Binds each retained lyric line to a time interval, either from detected
//! beat times or by spreading lines evenly across the song.
//!
//! With uneven beat spacing the produced intervals are not guaranteed to be
//! monotonic; callers see the beats as detected.

use super::sectionizer::retained_lines;
use lyricreel_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// One lyric line with its display interval (seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedLine {
    #[serde(rename = "line")]
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

impl TimedLine {
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
            duration: end_time - start_time,
        }
    }
}

/// Align lyric lines to beat times
///
/// Empty `beats` distributes lines evenly over `duration`. In every case the
/// final line ends exactly at `duration`.
pub fn align_lyrics_to_beats(lyrics: &str, beats: &[f64], duration: f64) -> Result<Vec<TimedLine>> {
    let lines = retained_lines(lyrics);
    if lines.is_empty() {
        return Err(Error::Validation("no lyrics lines to align".to_string()));
    }

    let mut timed = if beats.is_empty() {
        distribute_evenly(lines, duration)
    } else {
        follow_beats(lines, beats, duration)
    };

    if let Some(last) = timed.last_mut() {
        last.end_time = duration;
        last.duration = duration - last.start_time;
    }
    Ok(timed)
}

fn distribute_evenly(lines: Vec<String>, duration: f64) -> Vec<TimedLine> {
    let n = lines.len() as f64;
    let per_line = duration / n;
    lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let start = i as f64 * per_line;
            TimedLine::new(text, start, start + per_line)
        })
        .collect()
}

fn follow_beats(lines: Vec<String>, beats: &[f64], duration: f64) -> Vec<TimedLine> {
    let beats_per_line = (beats.len() / lines.len()).max(1);
    let last_beat = beats.len() - 1;
    let mut idx = 0;

    lines
        .into_iter()
        .map(|text| {
            let start = beats[idx];
            idx = (idx + beats_per_line).min(last_beat);
            TimedLine::new(text, start, beats[idx])
        })
        .collect()
}
