//! Lyrics structure and timing
//!
//! - `sectionizer`: splits raw lyrics into verse/chorus/... sections
//! - `aligner`: binds each retained line to a time interval
//!
//! Both operate on the same "retained" line list (trimmed, non-blank, not a
//! section marker, not a bracketed annotation), so section line ranges index
//! directly into the aligned timed lines.

pub mod aligner;
pub mod sectionizer;

pub use aligner::{align_lyrics_to_beats, TimedLine};
pub use sectionizer::{parse_lyrics, retained_lines, LyricsData, Section, SectionType};
