//! Background caption enrichment for freshly created schedules.
//!
//! Schedules are returned to the caller with placeholder captions so
//! creation stays fast. This pipeline then replaces the placeholders
//! post by post, in small concurrent batches, and flips the schedule to
//! ready when the pass is complete. One post failing to enrich never
//! blocks its siblings; only an unreachable store fails the whole run.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use preel_ai::CaptionRequest;
use preel_models::{
    CaptionSet, NotifyEvent, Platform, Post, ScheduleId, ScheduleStatus, UserVideoSettings,
};

use crate::error::{EngineError, EngineResult};
use crate::external::{CaptionGenerator, Notifier, ScheduleStore};
use crate::metrics;

/// Posts enriched concurrently per batch.
const BATCH_SIZE: usize = 3;

/// Pause between batches, to stay under the generator's rate limits.
const INTER_BATCH_DELAY: Duration = Duration::from_secs(2);

/// Replaces placeholder captions with generated ones.
#[derive(Clone)]
pub struct CaptionPipeline {
    store: Arc<dyn ScheduleStore>,
    captions: Arc<dyn CaptionGenerator>,
    notifier: Arc<dyn Notifier>,
}

impl CaptionPipeline {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        captions: Arc<dyn CaptionGenerator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            captions,
            notifier,
        }
    }

    /// Enrich every post of the schedule, then mark it ready.
    ///
    /// Emits a progress event after each batch. An error return means
    /// the store itself failed; the caller owns flipping the schedule
    /// to failed in that case.
    pub async fn run(
        &self,
        id: &ScheduleId,
        user_id: &str,
        settings: &UserVideoSettings,
        total: u32,
    ) -> EngineResult<()> {
        let schedule = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::schedule_not_found(id.as_str()))?;
        let posts = schedule.posts;

        info!(
            schedule_id = %id,
            posts = posts.len(),
            "Starting caption enrichment"
        );

        let mut processed = 0u32;
        for (batch_index, batch) in posts.chunks(BATCH_SIZE).enumerate() {
            let jobs = batch.iter().enumerate().map(|(offset, post)| {
                let index = batch_index * BATCH_SIZE + offset;
                self.enrich_post(id, index, post, settings)
            });
            for result in join_all(jobs).await {
                result?;
            }

            processed += batch.len() as u32;
            let event = NotifyEvent::caption_progress(id.as_str(), processed, total);
            if let Err(e) = self.notifier.notify(user_id, &event).await {
                warn!(schedule_id = %id, error = %e, "Caption progress notification failed");
            }

            if (batch_index + 1) * BATCH_SIZE < posts.len() {
                tokio::time::sleep(INTER_BATCH_DELAY).await;
            }
        }

        self.store.set_status(id, ScheduleStatus::Ready).await?;
        let ready = NotifyEvent::schedule_ready(id.as_str());
        if let Err(e) = self.notifier.notify(user_id, &ready).await {
            warn!(schedule_id = %id, error = %e, "Schedule ready notification failed");
        }

        info!(schedule_id = %id, enriched = processed, "Caption enrichment finished");
        Ok(())
    }

    /// Enrich one post, recording a per-post failure instead of failing
    /// the batch. Only store errors propagate.
    async fn enrich_post(
        &self,
        id: &ScheduleId,
        index: usize,
        post: &Post,
        settings: &UserVideoSettings,
    ) -> EngineResult<()> {
        let request = CaptionRequest {
            topic: post.description.clone(),
            keypoints: post.keypoints.clone(),
            context: settings.context.clone(),
            language: settings.context.language.clone(),
        };

        match self.captions.generate(&request).await {
            Ok(generated) => {
                let mut bounded = CaptionSet::default();
                for platform in Platform::ALL {
                    bounded.set(platform, generated.get(platform));
                }
                self.store.set_post_captions(id, index, &bounded).await?;
                metrics::record_caption_enriched("ready");
                debug!(schedule_id = %id, index, "Captions enriched");
            }
            Err(e) => {
                warn!(
                    schedule_id = %id,
                    index,
                    error = %e,
                    "Caption generation failed for post"
                );
                self.store
                    .set_post_captions_failed(id, index, &e.to_string())
                    .await?;
                metrics::record_caption_enriched("failed");
            }
        }

        Ok(())
    }
}
