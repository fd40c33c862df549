//! Phase 2: LYRICS

use super::{Processor, RunContext, STEP_LYRICS};
use crate::lyrics::{align_lyrics_to_beats, parse_lyrics};
use lyricreel_common::models::Job;
use lyricreel_common::{Error, Result};

impl Processor {
    pub(super) async fn phase_lyrics(&self, job: &mut Job, ctx: &mut RunContext) -> Result<()> {
        tracing::info!(job_id = job.id, "Phase 2: LYRICS");

        self.checkpoint(job, STEP_LYRICS, 22, "Parsing lyrics structure").await;
        let lyrics = parse_lyrics(ctx.song.lyrics_source())?;
        ctx.log.info(lyrics.section_summary().trim_end());

        self.checkpoint(job, STEP_LYRICS, 25, "Aligning lyrics with audio timing").await;
        let timed = align_lyrics_to_beats(&lyrics.raw_lyrics, &ctx.beats, ctx.song.duration_seconds)?;

        ctx.song.lyrics_sections = serde_json::to_string(&lyrics.sections)
            .map_err(|e| Error::Internal(format!("serialize lyrics sections: {}", e)))?;
        ctx.song.lyrics_display = serde_json::to_string(&timed)
            .map_err(|e| Error::Internal(format!("serialize timed lines: {}", e)))?;
        self.songs.update(&ctx.song).await?;

        let message = format!("Processed {} sections, {} lines", lyrics.sections.len(), timed.len());
        ctx.lyrics = Some(lyrics);
        ctx.timed_lines = timed;
        self.checkpoint(job, STEP_LYRICS, 30, &message).await;
        Ok(())
    }
}
