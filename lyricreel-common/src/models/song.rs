//! Song record consumed and updated by the render pipeline

use serde::{Deserialize, Serialize};

/// Span of detected singing inside a track (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VocalSegment {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

/// Song with stems, lyrics, analysis results and styling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist_name: String,
    pub genre: String,

    // Audio stems (may be empty; conventional storage paths are checked as fallback)
    pub vocals_stem_path: String,
    pub music_stem_path: String,
    pub mixed_audio_path: String,

    // Lyrics
    pub lyrics: String,
    /// Lyrics prepared for on-screen display; preferred over `lyrics` when present
    pub lyrics_karaoke: String,
    /// JSON-encoded sections written by the lyrics phase
    pub lyrics_sections: String,
    /// JSON-encoded timed lines written by the lyrics phase
    pub lyrics_display: String,
    /// Precomputed ASS karaoke caption track
    pub karaoke_subtitle_path: String,

    // Analysis
    pub bpm: f64,
    pub key: String,
    pub tempo: String,
    pub duration_seconds: f64,
    /// JSON-encoded `Vec<VocalSegment>`
    pub vocal_timing: String,

    // Styling
    pub background_style: String,
    pub spectrum_style: String,
    pub spectrum_color: String,
    pub spectrum_opacity: f64,
    pub brand_logo_path: String,
    pub copyright_text: String,
}

impl Song {
    /// Lyrics text the pipeline should sectionize
    pub fn lyrics_source(&self) -> &str {
        if self.lyrics_karaoke.trim().is_empty() {
            &self.lyrics
        } else {
            &self.lyrics_karaoke
        }
    }

    /// Whether a previous run already stored usable analysis results
    pub fn has_analysis(&self) -> bool {
        self.bpm > 0.0 && !self.key.is_empty() && self.duration_seconds > 0.0
    }

    /// Decoded vocal segments (empty when absent or unparseable)
    pub fn vocal_segments(&self) -> Vec<VocalSegment> {
        if self.vocal_timing.trim().is_empty() {
            return Vec::new();
        }
        serde_json::from_str(&self.vocal_timing).unwrap_or_default()
    }

    /// Time at which singing starts, if known
    pub fn vocal_onset(&self) -> Option<f64> {
        self.vocal_segments().first().map(|s| s.start)
    }
}
