//! Post lifecycle state machine.
//!
//! Every status move re-reads the schedule document and writes under its
//! version, so concurrent workers, the scanner and the completion
//! callback can all race on the same post without double-running it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use preel_models::{PostStatus, Schedule, ScheduleId};

use crate::error::{EngineError, EngineResult};
use crate::external::ScheduleStore;

/// Retries for guarded transitions that lose to concurrent writers.
const MAX_TRANSITION_RETRIES: u32 = 5;

/// Base delay between transition retries (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 50;

/// Guarded transitions over the embedded posts of a schedule.
#[derive(Clone)]
pub struct PostLifecycle {
    store: Arc<dyn ScheduleStore>,
}

impl PostLifecycle {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// Claim a pending post for processing.
    ///
    /// Exactly one of several racing callers wins; the others see
    /// [`EngineError::AlreadyProcessing`] or [`EngineError::AlreadyFinished`]
    /// depending on the state they observed. Returns the schedule as read
    /// at claim time, with the claimed post already flipped to processing.
    pub async fn claim_for_processing(
        &self,
        id: &ScheduleId,
        index: usize,
    ) -> EngineResult<Schedule> {
        for attempt in 0..MAX_TRANSITION_RETRIES {
            let versioned = self
                .store
                .get_versioned(id)
                .await?
                .ok_or_else(|| EngineError::schedule_not_found(id.as_str()))?;
            let post = versioned
                .schedule
                .post(index)
                .ok_or_else(|| EngineError::post_not_found(id.as_str(), index))?;

            match post.status {
                PostStatus::Pending => {}
                PostStatus::Processing => {
                    return Err(EngineError::AlreadyProcessing { index });
                }
                status => {
                    return Err(EngineError::AlreadyFinished {
                        index,
                        state: status.as_str(),
                    });
                }
            }

            match self
                .store
                .write_post_status(
                    id,
                    index,
                    PostStatus::Processing,
                    None,
                    None,
                    Some(&versioned.update_time),
                )
                .await
            {
                Ok(()) => {
                    let mut schedule = versioned.schedule;
                    schedule.posts[index].status = PostStatus::Processing;
                    return Ok(schedule);
                }
                Err(e) if e.is_version_conflict() => {
                    debug!(
                        schedule_id = %id,
                        index,
                        attempt = attempt + 1,
                        "Post claim lost a version race, retrying"
                    );
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            schedule_id = %id,
            index,
            retries = MAX_TRANSITION_RETRIES,
            "Post claim kept losing version races"
        );
        Err(EngineError::contention(format!("claim of post {}", index)))
    }

    /// Move a processing post into a terminal state.
    ///
    /// The transition is validated against a fresh read; redelivered or
    /// stale callbacks get a conflict error. Returns the schedule with
    /// the transition applied.
    pub async fn finish(
        &self,
        id: &ScheduleId,
        index: usize,
        next: PostStatus,
        video_id: Option<&str>,
        error: Option<&str>,
    ) -> EngineResult<Schedule> {
        for attempt in 0..MAX_TRANSITION_RETRIES {
            let versioned = self
                .store
                .get_versioned(id)
                .await?
                .ok_or_else(|| EngineError::schedule_not_found(id.as_str()))?;
            let post = versioned
                .schedule
                .post(index)
                .ok_or_else(|| EngineError::post_not_found(id.as_str(), index))?;

            let current = post.status;
            if current.is_terminal() {
                return Err(EngineError::AlreadyFinished {
                    index,
                    state: current.as_str(),
                });
            }
            if !current.can_transition_to(next) {
                return Err(EngineError::InvalidTransition {
                    from: current.as_str(),
                    to: next.as_str(),
                });
            }

            match self
                .store
                .write_post_status(
                    id,
                    index,
                    next,
                    error,
                    video_id,
                    Some(&versioned.update_time),
                )
                .await
            {
                Ok(()) => {
                    let mut schedule = versioned.schedule;
                    {
                        let post = &mut schedule.posts[index];
                        post.status = next;
                        if let Some(vid) = video_id {
                            post.video_id = Some(vid.to_string());
                        }
                        if let Some(message) = error {
                            post.error = Some(message.to_string());
                        }
                    }
                    return Ok(schedule);
                }
                Err(e) if e.is_version_conflict() => {
                    debug!(
                        schedule_id = %id,
                        index,
                        attempt = attempt + 1,
                        "Post finish lost a version race, retrying"
                    );
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            schedule_id = %id,
            index,
            retries = MAX_TRANSITION_RETRIES,
            "Post finish kept losing version races"
        );
        Err(EngineError::contention(format!("finish of post {}", index)))
    }

    /// Record a failure on a post this worker already claimed.
    ///
    /// The claim leaves this worker the only writer of the post's
    /// status; the write is unguarded and does not race concurrent
    /// caption or sibling-post writes.
    pub async fn record_failure(
        &self,
        id: &ScheduleId,
        index: usize,
        message: &str,
    ) -> EngineResult<()> {
        self.store
            .write_post_status(id, index, PostStatus::Failed, Some(message), None, None)
            .await
    }
}
