//! Lyrics sectionizer
//!
//! Explicit markers (`[Verse 2]`, `Chorus`, `[bridge]`, ...) open sections.
//! Without any marker, lyrics are cut into 4-line chunks and the most
//! repeated chunk is labeled chorus (exact text match only).

use lyricreel_common::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\[?\s*(verse|chorus|bridge|intro|outro)\s*(\d+)?\s*\]?:?$")
        .expect("section marker pattern is valid")
});

/// Chunk size used when no explicit markers exist
const IMPLICIT_CHUNK_LINES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Verse,
    Chorus,
    Bridge,
    Intro,
    Outro,
    Other,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Verse => "verse",
            SectionType::Chorus => "chorus",
            SectionType::Bridge => "bridge",
            SectionType::Intro => "intro",
            SectionType::Outro => "outro",
            SectionType::Other => "other",
        }
    }

    fn from_marker(word: &str) -> Self {
        match word.to_ascii_lowercase().as_str() {
            "verse" => SectionType::Verse,
            "chorus" => SectionType::Chorus,
            "bridge" => SectionType::Bridge,
            "intro" => SectionType::Intro,
            "outro" => SectionType::Outro,
            _ => SectionType::Other,
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labeled block of lyrics
///
/// `start_line`/`end_line` are inclusive indices into the retained lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "type")]
    pub section_type: SectionType,
    pub number: u32,
    pub start_line: usize,
    pub end_line: usize,
    pub lines: Vec<String>,
}

/// Parsed lyrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsData {
    pub raw_lyrics: String,
    pub sections: Vec<Section>,
    pub total_lines: usize,
    /// True when the text carried explicit section markers
    pub has_sections: bool,
}

impl LyricsData {
    /// Human-readable section overview for logs
    pub fn section_summary(&self) -> String {
        if self.sections.is_empty() {
            return "No sections detected".to_string();
        }

        let mut summary = format!("Found {} sections:\n", self.sections.len());
        for section in &self.sections {
            let name = section.section_type.as_str();
            let mut chars = name.chars();
            let title: String = chars
                .next()
                .map(|c| c.to_ascii_uppercase().to_string() + chars.as_str())
                .unwrap_or_default();
            summary.push_str(&format!(
                "  {} {}: {} lines (lines {}-{})\n",
                title,
                section.number,
                section.lines.len(),
                section.start_line,
                section.end_line
            ));
        }
        summary
    }
}

enum LineKind<'a> {
    Marker(SectionType, Option<u32>),
    Annotation,
    Lyric(&'a str),
}

fn classify(line: &str) -> LineKind<'_> {
    if let Some(caps) = MARKER.captures(line) {
        let kind = SectionType::from_marker(&caps[1]);
        let number = caps.get(2).and_then(|m| m.as_str().parse().ok());
        return LineKind::Marker(kind, number);
    }
    if line.starts_with('[') {
        return LineKind::Annotation;
    }
    LineKind::Lyric(line)
}

fn trimmed_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Lyric lines that receive timing: trimmed, non-blank, not markers, not annotations
pub fn retained_lines(raw: &str) -> Vec<String> {
    trimmed_lines(raw)
        .filter_map(|line| match classify(line) {
            LineKind::Lyric(text) => Some(text.to_string()),
            _ => None,
        })
        .collect()
}

/// Split raw lyrics into contiguous sections covering every retained line once
pub fn parse_lyrics(raw: &str) -> Result<LyricsData> {
    if raw.trim().is_empty() {
        return Err(Error::Validation("empty lyrics".to_string()));
    }

    let mut lines: Vec<String> = Vec::new();
    let mut markers: Vec<(usize, SectionType, Option<u32>)> = Vec::new();
    for line in trimmed_lines(raw) {
        match classify(line) {
            LineKind::Marker(kind, number) => markers.push((lines.len(), kind, number)),
            LineKind::Annotation => {}
            LineKind::Lyric(text) => lines.push(text.to_string()),
        }
    }

    if lines.is_empty() {
        return Err(Error::Validation("no valid lyrics lines found".to_string()));
    }

    let has_sections = !markers.is_empty();
    let sections = if has_sections {
        explicit_sections(&lines, &markers)
    } else {
        implicit_sections(&lines)
    };

    Ok(LyricsData {
        raw_lyrics: raw.to_string(),
        total_lines: lines.len(),
        sections,
        has_sections,
    })
}

/// Markers are `(index of the next retained line, type, explicit number)`
fn explicit_sections(lines: &[String], markers: &[(usize, SectionType, Option<u32>)]) -> Vec<Section> {
    let mut verse_count = 1;
    let mut chorus_count = 0;
    let mut number_for = |kind: SectionType, explicit: Option<u32>| -> u32 {
        match kind {
            SectionType::Verse => {
                let number = explicit.unwrap_or(verse_count);
                verse_count += 1;
                number
            }
            SectionType::Chorus => {
                chorus_count += 1;
                chorus_count
            }
            _ => 1,
        }
    };

    // Lines before the first marker form an implicit "verse 1"
    let mut openings: Vec<(usize, SectionType, u32)> = Vec::with_capacity(markers.len() + 1);
    if markers.first().map(|m| m.0) != Some(0) {
        openings.push((0, SectionType::Verse, number_for(SectionType::Verse, Some(1))));
    }
    for &(start, kind, explicit) in markers {
        openings.push((start, kind, number_for(kind, explicit)));
    }

    let mut sections = Vec::new();
    for (i, &(start, kind, number)) in openings.iter().enumerate() {
        let end = openings.get(i + 1).map(|o| o.0).unwrap_or(lines.len());
        // Marker immediately followed by another marker (or end of text)
        if end <= start {
            continue;
        }
        sections.push(Section {
            section_type: kind,
            number,
            start_line: start,
            end_line: end - 1,
            lines: lines[start..end].to_vec(),
        });
    }
    sections
}

fn implicit_sections(lines: &[String]) -> Vec<Section> {
    let chunks: Vec<&[String]> = lines.chunks(IMPLICIT_CHUNK_LINES).collect();
    let texts: Vec<String> = chunks.iter().map(|c| c.join("\n")).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for text in &texts {
        *counts.entry(text.as_str()).or_default() += 1;
    }

    // Most repeated chunk, earliest occurrence on ties
    let mut chorus_text: Option<&str> = None;
    let mut best = 1;
    for text in &texts {
        let count = counts[text.as_str()];
        if count > best {
            best = count;
            chorus_text = Some(text.as_str());
        }
    }

    let mut verse_number = 0;
    let mut chorus_number = 0;
    let mut sections = Vec::with_capacity(chunks.len());
    for (i, (chunk, text)) in chunks.iter().zip(&texts).enumerate() {
        let start = i * IMPLICIT_CHUNK_LINES;
        let (section_type, number) = if Some(text.as_str()) == chorus_text {
            chorus_number += 1;
            (SectionType::Chorus, chorus_number)
        } else {
            verse_number += 1;
            (SectionType::Verse, verse_number)
        };
        sections.push(Section {
            section_type,
            number,
            start_line: start,
            end_line: start + chunk.len() - 1,
            lines: chunk.to_vec(),
        });
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sections must tile [0, total_lines) in order with no gaps
    fn assert_contiguous_cover(data: &LyricsData) {
        let mut next = 0;
        for section in &data.sections {
            assert_eq!(section.start_line, next, "gap or overlap before {:?}", section);
            assert_eq!(section.end_line + 1 - section.start_line, section.lines.len());
            next = section.end_line + 1;
        }
        assert_eq!(next, data.total_lines);
    }

    #[test]
    fn explicit_markers_example() {
        let data = parse_lyrics(
            "[Verse 1]\nline a\nline b\n\n[Chorus]\nline c\nline d\n\n[Verse 2]\nline e\nline f",
        )
        .unwrap();

        assert_eq!(data.total_lines, 6);
        assert!(data.has_sections);
        let shape: Vec<(SectionType, u32, usize)> = data
            .sections
            .iter()
            .map(|s| (s.section_type, s.number, s.lines.len()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (SectionType::Verse, 1, 2),
                (SectionType::Chorus, 1, 2),
                (SectionType::Verse, 2, 2),
            ]
        );
        assert_eq!(data.sections[1].lines, vec!["line c", "line d"]);
        assert_contiguous_cover(&data);
    }

    #[test]
    fn lines_before_first_marker_open_implicit_verse() {
        let data = parse_lyrics("opening line\nsecond line\n[Chorus]\nhook\n[Verse]\nmore").unwrap();

        assert_eq!(data.sections[0].section_type, SectionType::Verse);
        assert_eq!(data.sections[0].number, 1);
        assert_eq!(data.sections[0].lines.len(), 2);
        // Counter continues after the implicit verse
        assert_eq!(data.sections[2].section_type, SectionType::Verse);
        assert_eq!(data.sections[2].number, 2);
        assert_contiguous_cover(&data);
    }

    #[test]
    fn markers_are_case_insensitive_and_bracket_optional() {
        let data = parse_lyrics("INTRO\nhello\nchorus\nla la\n[Outro]\nbye\n[CHORUS]\nla la").unwrap();

        let kinds: Vec<(SectionType, u32)> =
            data.sections.iter().map(|s| (s.section_type, s.number)).collect();
        assert_eq!(
            kinds,
            vec![
                (SectionType::Intro, 1),
                (SectionType::Chorus, 1),
                (SectionType::Outro, 1),
                (SectionType::Chorus, 2),
            ]
        );
    }

    #[test]
    fn empty_sections_and_annotations_are_dropped() {
        let data =
            parse_lyrics("[Intro]\n[Verse 1]\nfirst\n[Pre-Chorus]\nrise\n[Bridge]\n[Chorus]\nhook\n[Outro]")
                .unwrap();

        // "[Pre-Chorus]" is an annotation; "rise" stays in verse 1
        assert_eq!(data.total_lines, 3);
        assert_eq!(data.sections.len(), 2);
        assert_eq!(data.sections[0].lines, vec!["first", "rise"]);
        assert_eq!(data.sections[1].section_type, SectionType::Chorus);
        assert_contiguous_cover(&data);
    }

    #[test]
    fn implicit_chunks_cover_all_lines() {
        for n in 1..=13 {
            let raw: String = (0..n).map(|i| format!("unique line {}\n", i)).collect();
            let data = parse_lyrics(&raw).unwrap();

            assert!(!data.has_sections);
            assert_eq!(data.sections.len(), (n + 3) / 4, "n={}", n);
            for (i, section) in data.sections.iter().enumerate() {
                assert!(section.lines.len() <= 4);
                if i + 1 < data.sections.len() {
                    assert_eq!(section.lines.len(), 4);
                }
                assert_eq!(section.section_type, SectionType::Verse);
            }
            assert_contiguous_cover(&data);
        }
    }

    #[test]
    fn repeated_chunk_becomes_chorus() {
        let chorus = "oh oh\nhere we go\nall night\nlong";
        let raw = format!(
            "a1\na2\na3\na4\n{}\nb1\nb2\nb3\nb4\n{}\n",
            chorus, chorus
        );
        let data = parse_lyrics(&raw).unwrap();

        let kinds: Vec<(SectionType, u32)> =
            data.sections.iter().map(|s| (s.section_type, s.number)).collect();
        assert_eq!(
            kinds,
            vec![
                (SectionType::Verse, 1),
                (SectionType::Chorus, 1),
                (SectionType::Verse, 2),
                (SectionType::Chorus, 2),
            ]
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(parse_lyrics("  \n\n"), Err(Error::Validation(_))));
        assert!(matches!(parse_lyrics("[Verse 1]\n[Chorus]"), Err(Error::Validation(_))));
    }

    #[test]
    fn summary_lists_sections() {
        let data = parse_lyrics("[Verse 1]\nline a\nline b").unwrap();
        assert_eq!(
            data.section_summary(),
            "Found 1 sections:\n  Verse 1: 2 lines (lines 0-1)\n"
        );
    }
}
