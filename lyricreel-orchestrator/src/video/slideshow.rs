//! Image slideshow stage: one still clip per segment, joined with crossfades

use super::ImageSegment;

/// One still clip to render, referencing a segment by index
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedClip {
    pub segment: usize,
    pub duration: f64,
}

/// Clip durations and xfade offsets for a slideshow
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CrossfadePlan {
    pub clips: Vec<PlannedClip>,
    /// Offset of transition `i` (between clip `i` and `i+1`)
    pub offsets: Vec<f64>,
}

/// Plan clips so that consecutive clips overlap by `crossfade` seconds
///
/// Every non-final clip is extended by the crossfade; transition offsets are
/// the cumulative untransformed durations of the preceding segments, so each
/// image appears on screen at its segment's start. Segments with a
/// non-positive duration are skipped.
pub fn crossfade_plan(segments: &[ImageSegment], crossfade: f64) -> CrossfadePlan {
    let valid: Vec<(usize, f64)> = segments
        .iter()
        .enumerate()
        .filter_map(|(i, seg)| {
            let duration = seg.end_time - seg.start_time;
            if duration > 0.0 {
                Some((i, duration))
            } else {
                tracing::warn!(segment = i, duration, "Skipping image segment with invalid duration");
                None
            }
        })
        .collect();

    let last = valid.len().saturating_sub(1);
    let clips = valid
        .iter()
        .enumerate()
        .map(|(n, &(segment, duration))| PlannedClip {
            segment,
            duration: if n < last { duration + crossfade } else { duration },
        })
        .collect();

    let mut offsets = Vec::with_capacity(last);
    let mut elapsed = 0.0;
    for &(_, duration) in valid.iter().take(last) {
        elapsed += duration;
        offsets.push(elapsed);
    }

    CrossfadePlan { clips, offsets }
}

/// Scale-and-pad arguments rendering one still image as a clip
pub fn still_clip_args(image: &str, duration: f64, width: u32, height: u32, fps: u32, output: &str) -> Vec<String> {
    vec![
        "-loop".into(),
        "1".into(),
        "-i".into(),
        image.into(),
        "-t".into(),
        format!("{:.2}", duration),
        "-vf".into(),
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black",
            w = width,
            h = height
        ),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        fps.to_string(),
        "-y".into(),
        output.into(),
    ]
}

/// `[0:v][1:v]xfade=...[v1];[v1][2:v]xfade=...[outv]`
pub fn xfade_filter(offsets: &[f64], crossfade: f64) -> String {
    let mut parts = Vec::with_capacity(offsets.len());
    let mut current = "[0:v]".to_string();
    for (i, offset) in offsets.iter().enumerate() {
        let input = i + 1;
        let next = if input == offsets.len() {
            "[outv]".to_string()
        } else {
            format!("[v{}]", input)
        };
        parts.push(format!(
            "{}[{}:v]xfade=transition=fade:duration={:.2}:offset={:.2}{}",
            current, input, crossfade, offset, next
        ));
        current = next;
    }
    parts.join(";")
}
