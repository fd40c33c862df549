//! Phase 3: IMAGES
//!
//! One background per distinct section image filename; repeated choruses
//! share a single generation.

use super::{Processor, RunContext, STEP_IMAGES};
use crate::services::{build_style_keywords, image_filename};
use lyricreel_common::models::Job;
use lyricreel_common::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Progress window for per-section generation (34..=50)
const SECTION_PROGRESS_BASE: usize = 34;
const SECTION_PROGRESS_SPAN: usize = 16;

impl Processor {
    pub(super) async fn phase_images(&self, job: &mut Job, ctx: &mut RunContext) -> Result<()> {
        tracing::info!(job_id = job.id, "Phase 3: IMAGES");
        self.checkpoint(job, STEP_IMAGES, 30, "Preparing image generation").await;

        let sections = ctx
            .lyrics
            .as_ref()
            .map(|l| l.sections.clone())
            .ok_or_else(|| Error::Internal("lyrics were not processed".to_string()))?;

        self.checkpoint(job, STEP_IMAGES, 34, "Parsing lyrics sections").await;
        let keywords = build_style_keywords(&ctx.song.genre, &ctx.song.background_style);
        ctx.log.property("Style Keywords", &keywords);
        tracing::info!(
            job_id = job.id,
            sections = sections.len(),
            estimate_secs = self.images.estimate_remaining(sections.len()).as_secs(),
            "Generating section images"
        );

        let total = sections.len().max(1);
        let mut resolved: HashMap<String, PathBuf> = HashMap::new();
        for (i, section) in sections.iter().enumerate() {
            let kind = section.section_type.as_str();
            let filename = image_filename(kind, section.number);
            if resolved.contains_key(&filename) {
                tracing::debug!(section = kind, number = section.number, %filename, "Reusing image");
                continue;
            }

            let progress = SECTION_PROGRESS_BASE + (i + 1) * SECTION_PROGRESS_SPAN / total;
            let message = format!(
                "Generating image for {} {} ({})",
                kind, section.number, filename
            );
            self.checkpoint(job, STEP_IMAGES, progress as i32, &message).await;

            let path = self
                .images
                .generate_for_section(
                    &ctx.images_dir,
                    kind,
                    section.number,
                    &section.lines.join("\n"),
                    &keywords,
                )
                .await?;
            ctx.log.info(format!("{} {} -> {}", kind, section.number, path.display()));
            resolved.insert(filename, path);
        }

        let message = format!(
            "Generated {} unique images from {} sections",
            resolved.len(),
            sections.len()
        );
        ctx.log.success(&message);
        self.checkpoint(job, STEP_IMAGES, 50, &message).await;
        Ok(())
    }
}
