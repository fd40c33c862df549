//! drawtext overlays: song metadata, branding and synthesized lyric cues

use super::text::{escape_drawtext, wrap_lyric_line, LYRIC_LINE_BUDGET};
use super::LyricLine;

const FONT_BOLD: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSansCondensed-Bold.ttf";
const FONT_REGULAR: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";
const GOLD: &str = "0xFFD700";
const LYRIC_BLUE: &str = "0x4169E1";

/// Vertical distance between stacked lyric lines
const LYRIC_LINE_SPACING: i64 = 80;
/// Active line first, then up to three upcoming lines
const LYRIC_OPACITY: [f64; 4] = [1.0, 0.5, 0.3, 0.1];
/// Onset beyond which the intro progress bar and countdown are shown
const INTRO_MIN_ONSET: f64 = 2.0;
const INTRO_BAR_WIDTH: u32 = 600;

/// Text shown by the metadata/branding stage
#[derive(Debug, Clone, Default)]
pub struct MetadataText<'a> {
    pub key: &'a str,
    pub tempo: &'a str,
    pub bpm: f64,
    pub title: &'a str,
    pub copyright: &'a str,
}

fn gold_text(text: &str, position: &str, fontsize: u32) -> String {
    format!(
        "drawtext=text='{}':{}:fontsize={}:fontcolor={}:fontfile={}:shadowcolor=black@0.7:shadowx=2:shadowy=2",
        text, position, fontsize, GOLD, FONT_BOLD
    )
}

/// Comma-joined drawtext chain: KEY top-left, tempo top-centre, BPM
/// top-right, title bottom-left, copyright bottom-centre
pub fn metadata_filter(meta: &MetadataText<'_>) -> String {
    let mut parts = Vec::new();

    if !meta.key.trim().is_empty() {
        parts.push(gold_text(
            &format!("KEY\\\\: {}", escape_drawtext(meta.key)),
            "x=20:y=20",
            48,
        ));
    }
    if !meta.tempo.trim().is_empty() {
        parts.push(gold_text(&escape_drawtext(meta.tempo), "x=(w-text_w)/2:y=20", 48));
    }
    if meta.bpm > 0.0 {
        parts.push(gold_text(&format!("BPM\\\\: {:.0}", meta.bpm), "x=w-text_w-20:y=20", 48));
    }
    parts.push(gold_text(&escape_drawtext(meta.title), "x=20:y=h-96", 64));
    if !meta.copyright.trim().is_empty() {
        parts.push(format!(
            "drawtext=text='{}':x=(w-text_w)/2:y=h-25:fontsize=20:fontcolor=white:fontfile={}:shadowcolor=black@0.7:shadowx=1:shadowy=1",
            escape_drawtext(meta.copyright),
            FONT_REGULAR
        ));
    }

    parts.join(",")
}

/// Graph placing `text_filter` on input 0 and a translucent logo (input 1) bottom-right
pub fn logo_filter_complex(text_filter: &str) -> String {
    format!(
        "[0:v]{}[v1];[1:v]scale=256:256,format=rgba,colorchannelmixer=aa=0.7[logo];[v1][logo]overlay=W-w-20:H-h-20[vout]",
        text_filter
    )
}

/// Shift by the vocal onset and wrap long lines into display lines
pub fn display_lines(lyrics: &[LyricLine], vocal_onset: f64) -> Vec<LyricLine> {
    let onset = vocal_onset.max(0.0);
    lyrics
        .iter()
        .filter(|l| !l.text.trim().is_empty())
        .flat_map(|l| {
            let shifted = LyricLine {
                text: l.text.trim().to_string(),
                start_time: l.start_time + onset,
                end_time: l.end_time + onset,
            };
            wrap_lyric_line(&shifted, LYRIC_LINE_BUDGET)
        })
        .collect()
}

/// drawtext chain for scrolling lyric cues
///
/// While display line `i` is active it is drawn at full opacity with lines
/// `i+1..=i+3` stacked below it, progressively fainter. With a late vocal
/// onset an intro progress bar and countdown fill the gap.
pub fn lyrics_filter(lines: &[LyricLine], vocal_onset: f64, height: u32) -> String {
    let center_y = i64::from(height / 2);
    let mut parts = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        for (slot, opacity) in LYRIC_OPACITY.iter().enumerate() {
            let Some(shown) = lines.get(i + slot) else {
                break;
            };
            let y = center_y + LYRIC_LINE_SPACING * (slot as i64 - 1);
            let (font_color, border_color) = if slot == 0 {
                (LYRIC_BLUE.to_string(), "white".to_string())
            } else {
                (format!("{}@{}", LYRIC_BLUE, opacity), format!("white@{}", opacity))
            };
            parts.push(format!(
                "drawtext=text='{}':x=(w-text_w)/2:y={}:fontsize=64:fontcolor={}:fontfile={}:borderw=3:bordercolor={}:enable=between(t\\,{:.2}\\,{:.2})",
                escape_drawtext(&shown.text),
                y,
                font_color,
                FONT_BOLD,
                border_color,
                line.start_time,
                line.end_time
            ));
        }
    }

    let onset = vocal_onset.max(0.0);
    if onset > INTRO_MIN_ONSET {
        let bar_y = (f64::from(height) * 0.75) as i64;
        parts.push(format!(
            "drawbox=x=(w-{w})/2:y={y}:w={w}*min(1\\,t/{onset:.2}):h=6:color={gold}:enable=lt(t\\,{onset:.2})",
            w = INTRO_BAR_WIDTH,
            y = bar_y,
            onset = onset,
            gold = GOLD
        ));
        parts.push(format!(
            "drawtext=text='Starting in %{{eif\\:max(0\\,{onset:.2}-t)\\:d}}s':x=(w-text_w)/2:y={y}:fontsize=36:fontcolor={gold}:fontfile={font}:shadowcolor=black@0.7:shadowx=2:shadowy=2:enable=lt(t\\,{onset:.2})",
            onset = onset,
            y = bar_y - 40,
            gold = GOLD,
            font = FONT_BOLD
        ));
    }

    parts.join(",")
}
