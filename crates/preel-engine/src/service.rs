//! Schedule operations behind a single service facade.
//!
//! The service owns the full lifecycle: creation plans the posts and
//! starts caption enrichment, edits run as guarded writes against the
//! stored document version, dispatch hands due posts to the video
//! orchestrator and the completion callback closes each post out.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Months, Utc};
use tracing::{debug, error, info, warn};
use validator::Validate;

use preel_ai::CaptionRequest;
use preel_models::{
    parse_timezone, CaptionSet, CaptionStatus, CreateScheduleRequest, DuePost, NotifyEvent,
    Platform, Post, PostStatus, RecurrenceRule, Schedule, ScheduleId, ScheduleStatus,
    UpdatePostRequest, UpdateScheduleRequest, UserVideoSettings,
};
use preel_notify::EmailTemplate;

use crate::captions::CaptionPipeline;
use crate::dedup::TopicDeduplicator;
use crate::error::{EngineError, EngineResult};
use crate::external::{
    CaptionGenerator, EngineDeps, MailSender, Notifier, ScheduleStore, SettingsReader,
    TrendGenerator,
};
use crate::lifecycle::PostLifecycle;
use crate::metrics;
use crate::planner;
use crate::processing::{best_effort, VideoOrchestrator};

/// Retries for guarded edits that lose to concurrent writers.
const MAX_UPDATE_RETRIES: u32 = 5;

/// Base delay between edit retries (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 50;

// =============================================================================
// Service
// =============================================================================

/// Every schedule operation, from creation through video dispatch.
#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
    trends: Arc<dyn TrendGenerator>,
    captions: Arc<dyn CaptionGenerator>,
    settings: Arc<dyn SettingsReader>,
    notifier: Arc<dyn Notifier>,
    mailer: Arc<dyn MailSender>,
    dedup: TopicDeduplicator,
    pipeline: CaptionPipeline,
    orchestrator: VideoOrchestrator,
    lifecycle: PostLifecycle,
}

impl ScheduleService {
    pub fn new(deps: EngineDeps) -> Self {
        let dedup = TopicDeduplicator::new(Arc::clone(&deps.trends), Arc::clone(&deps.history));
        let pipeline = CaptionPipeline::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.captions),
            Arc::clone(&deps.notifier),
        );
        let orchestrator = VideoOrchestrator::new(&deps);
        let lifecycle = PostLifecycle::new(Arc::clone(&deps.store));

        Self {
            store: deps.store,
            trends: deps.trends,
            captions: deps.captions,
            settings: deps.settings,
            notifier: deps.notifier,
            mailer: deps.mailer,
            dedup,
            pipeline,
            orchestrator,
            lifecycle,
        }
    }

    // =========================================================================
    // Schedule operations
    // =========================================================================

    /// Create a recurring schedule for the user.
    ///
    /// Plans one month of posts from the requested cadence, filling the
    /// slots with trends the user has not posted about before, then
    /// stores the schedule and starts caption enrichment in the
    /// background. The returned posts still carry placeholder captions.
    ///
    /// # Arguments
    /// * `request` - Creation payload, validated here
    ///
    /// # Returns
    /// The stored schedule with posts in slot order.
    pub async fn create_schedule(&self, request: CreateScheduleRequest) -> EngineResult<Schedule> {
        request
            .validate()
            .map_err(|e| EngineError::validation(e.to_string()))?;
        let tz = parse_timezone(&request.timezone)?;
        let rule = RecurrenceRule::parse(request.frequency, &request.recurrence)?;

        if let Some(existing) = self.store.find_active_for_user(&request.user_id).await? {
            debug!(
                user_id = %request.user_id,
                schedule_id = %existing.schedule_id,
                "User already has an active schedule"
            );
            return Err(EngineError::ActiveScheduleExists(request.user_id));
        }

        let now = Utc::now();
        let start_date = request.start_date.unwrap_or(now);
        let end_date = start_date
            .checked_add_months(Months::new(1))
            .ok_or_else(|| EngineError::validation("start date out of range"))?;
        let target = request
            .frequency
            .slot_target((end_date - start_date).num_days());

        let pool = self
            .dedup
            .fill(target, &request.user_id, &request.email, None)
            .await?;
        let posts = planner::plan(&rule, tz, start_date, end_date, &pool, now)?;
        info!(
            user_id = %request.user_id,
            frequency = request.frequency.as_str(),
            target,
            planned = posts.len(),
            "Planned schedule"
        );

        let schedule = Schedule::new(
            request.user_id,
            request.email,
            request.timezone,
            request.frequency,
            request.recurrence,
            start_date,
            end_date,
            posts,
        );
        self.store.create(&schedule).await?;
        metrics::record_schedule_created(schedule.frequency.as_str());

        self.spawn_enrichment(&schedule);
        Ok(schedule)
    }

    /// Active schedule for a user, if any.
    pub async fn get_user_schedule(&self, user_id: &str) -> EngineResult<Option<Schedule>> {
        self.store.find_active_for_user(user_id).await
    }

    /// Schedule by id.
    pub async fn get_schedule(&self, id: &ScheduleId) -> EngineResult<Schedule> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::schedule_not_found(id.as_str()))
    }

    /// Change cadence fields and re-time the pending posts.
    ///
    /// Missing request fields keep their current values. Posts already
    /// processing or finished keep their history; pending posts move
    /// onto the new rule's slots in index order.
    pub async fn update_schedule(
        &self,
        id: &ScheduleId,
        request: UpdateScheduleRequest,
    ) -> EngineResult<Schedule> {
        if request.is_empty() {
            return self.get_schedule(id).await;
        }

        for attempt in 0..MAX_UPDATE_RETRIES {
            let versioned = self
                .store
                .get_versioned(id)
                .await?
                .ok_or_else(|| EngineError::schedule_not_found(id.as_str()))?;
            let schedule = versioned.schedule;

            let frequency = request.frequency.unwrap_or(schedule.frequency);
            let recurrence = request
                .recurrence
                .clone()
                .unwrap_or_else(|| schedule.recurrence.clone());
            let timezone = request
                .timezone
                .clone()
                .unwrap_or_else(|| schedule.timezone.clone());
            let tz = parse_timezone(&timezone)?;
            let rule = RecurrenceRule::parse(frequency, &recurrence)?;

            let mut posts = schedule.posts.clone();
            planner::retime_pending(
                &mut posts,
                &rule,
                tz,
                schedule.start_date,
                schedule.end_date,
                Utc::now(),
            );

            match self
                .store
                .update_cadence(
                    id,
                    frequency,
                    &recurrence,
                    &timezone,
                    &posts,
                    &versioned.update_time,
                )
                .await
            {
                Ok(()) => {
                    info!(
                        schedule_id = %id,
                        frequency = frequency.as_str(),
                        "Schedule cadence updated"
                    );
                    let mut updated = schedule;
                    updated.frequency = frequency;
                    updated.recurrence = recurrence;
                    updated.timezone = timezone;
                    updated.posts = posts;
                    return Ok(updated);
                }
                Err(e) if e.is_version_conflict() => {
                    debug!(
                        schedule_id = %id,
                        attempt = attempt + 1,
                        "Cadence write lost a version race, retrying"
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
            retries = MAX_UPDATE_RETRIES,
            "Cadence update kept losing version races"
        );
        Err(EngineError::contention(format!("update of schedule {}", id)))
    }

    /// Take the schedule off the dispatch path without deleting it.
    pub async fn deactivate_schedule(&self, id: &ScheduleId) -> EngineResult<()> {
        self.get_schedule(id).await?;
        self.store.set_active(id, false).await?;
        info!(schedule_id = %id, "Schedule deactivated");
        Ok(())
    }

    /// Remove the schedule document entirely.
    pub async fn delete_schedule(&self, id: &ScheduleId) -> EngineResult<()> {
        self.store.delete(id).await?;
        info!(schedule_id = %id, "Schedule deleted");
        Ok(())
    }

    // =========================================================================
    // Post operations
    // =========================================================================

    /// Edit a pending post.
    ///
    /// A topic change regenerates keypoints and every platform caption,
    /// discarding caption text supplied alongside it. Any other edit
    /// patches exactly the supplied fields.
    pub async fn update_post(
        &self,
        id: &ScheduleId,
        index: usize,
        request: UpdatePostRequest,
    ) -> EngineResult<Post> {
        for attempt in 0..MAX_UPDATE_RETRIES {
            let versioned = self
                .store
                .get_versioned(id)
                .await?
                .ok_or_else(|| EngineError::schedule_not_found(id.as_str()))?;
            let schedule = versioned.schedule;
            let post = schedule
                .post(index)
                .ok_or_else(|| EngineError::post_not_found(id.as_str(), index))?;

            if !post.is_pending() {
                return Err(EngineError::PostNotEditable {
                    index,
                    state: post.status.as_str(),
                });
            }
            if request.is_empty() {
                return Ok(post.clone());
            }

            let mut updated = post.clone();
            match &request.description {
                Some(topic) if request.is_topic_change(&post.description) => {
                    let topic = topic.trim().to_string();
                    let keypoints = self.trends.keypoints(&topic).await?;
                    let settings = match self.settings.video_settings(&schedule.user_id).await {
                        Ok(settings) => settings,
                        Err(e) => {
                            warn!(
                                user_id = %schedule.user_id,
                                error = %e,
                                "Using default settings for caption regeneration"
                            );
                            UserVideoSettings::default()
                        }
                    };
                    let caption_request = CaptionRequest {
                        topic: topic.clone(),
                        keypoints: keypoints.clone(),
                        context: settings.context.clone(),
                        language: settings.context.language.clone(),
                    };
                    let generated = self.captions.generate(&caption_request).await?;

                    let mut bounded = CaptionSet::default();
                    for platform in Platform::ALL {
                        bounded.set(platform, generated.get(platform));
                    }
                    updated.description = topic;
                    updated.keypoints = keypoints;
                    updated.captions = bounded;
                    updated.caption_status = CaptionStatus::Ready;
                    updated.enhanced = true;
                    debug!(schedule_id = %id, index, "Topic changed, captions regenerated");
                }
                _ => {
                    if let Some(description) = &request.description {
                        updated.description = description.clone();
                    }
                    if let Some(keypoints) = &request.keypoints {
                        updated.keypoints = keypoints.clone();
                    }
                    for (platform, text) in request.supplied_captions() {
                        updated.captions.set(platform, text);
                    }
                }
            }

            match self
                .store
                .update_post_content(id, index, &updated, &versioned.update_time)
                .await
            {
                Ok(()) => {
                    info!(schedule_id = %id, index, "Post updated");
                    return Ok(updated);
                }
                Err(e) if e.is_version_conflict() => {
                    debug!(
                        schedule_id = %id,
                        index,
                        attempt = attempt + 1,
                        "Post edit lost a version race, retrying"
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
            retries = MAX_UPDATE_RETRIES,
            "Post edit kept losing version races"
        );
        Err(EngineError::contention(format!("edit of post {}", index)))
    }

    /// Remove a post; the ones after it shift down one index.
    pub async fn delete_post(&self, id: &ScheduleId, index: usize) -> EngineResult<()> {
        for attempt in 0..MAX_UPDATE_RETRIES {
            let versioned = self
                .store
                .get_versioned(id)
                .await?
                .ok_or_else(|| EngineError::schedule_not_found(id.as_str()))?;
            if index >= versioned.schedule.posts.len() {
                return Err(EngineError::post_not_found(id.as_str(), index));
            }

            let mut posts = versioned.schedule.posts;
            posts.remove(index);

            match self
                .store
                .replace_posts(id, &posts, &versioned.update_time)
                .await
            {
                Ok(()) => {
                    info!(schedule_id = %id, index, remaining = posts.len(), "Post deleted");
                    return Ok(());
                }
                Err(e) if e.is_version_conflict() => {
                    debug!(
                        schedule_id = %id,
                        index,
                        attempt = attempt + 1,
                        "Post removal lost a version race, retrying"
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
            retries = MAX_UPDATE_RETRIES,
            "Post removal kept losing version races"
        );
        Err(EngineError::contention(format!("removal of post {}", index)))
    }

    // =========================================================================
    // Dispatch and completion
    // =========================================================================

    /// Pending posts whose slot falls inside the dispatch window.
    pub async fn get_due_posts(&self, lead_minutes: i64) -> EngineResult<Vec<DuePost>> {
        let now = Utc::now();
        let lead = chrono::Duration::minutes(lead_minutes);

        let mut due = Vec::new();
        for schedule in self.store.list_active().await? {
            for (post_index, post) in schedule.posts.iter().enumerate() {
                if post.is_due(now, lead) {
                    due.push(DuePost {
                        schedule_id: schedule.schedule_id.clone(),
                        post_index,
                        user_id: schedule.user_id.clone(),
                        email: schedule.email.clone(),
                        description: post.description.clone(),
                        scheduled_for: post.scheduled_for,
                    });
                }
            }
        }
        Ok(due)
    }

    /// Run the full video pipeline for one due post.
    pub async fn process_scheduled_post(&self, id: &ScheduleId, index: usize) -> EngineResult<()> {
        self.orchestrator.process(id, index).await
    }

    /// Apply the terminal outcome reported back by the video backend.
    ///
    /// A completed post triggers the video-ready email and event. When
    /// the last open post resolves, the schedule-complete pair goes out
    /// as well.
    pub async fn update_post_status(
        &self,
        id: &ScheduleId,
        index: usize,
        status: PostStatus,
        video_id: Option<&str>,
    ) -> EngineResult<()> {
        if !status.is_terminal() {
            return Err(EngineError::validation(format!(
                "status must be terminal, got {}",
                status.as_str()
            )));
        }
        let error = if status == PostStatus::Failed {
            Some("Video generation failed")
        } else {
            None
        };

        let schedule = self
            .lifecycle
            .finish(id, index, status, video_id, error)
            .await?;
        let post = &schedule.posts[index];

        if status == PostStatus::Completed {
            info!(
                schedule_id = %id,
                index,
                video_id = video_id.unwrap_or(""),
                "Post completed"
            );
            best_effort(
                "Video generated email",
                self.mailer.send(
                    &schedule.email,
                    EmailTemplate::VideoGenerated,
                    serde_json::json!({
                        "topic": post.description.as_str(),
                        "video_id": video_id.unwrap_or(""),
                    }),
                ),
            )
            .await;
            let event =
                NotifyEvent::video_generated(id.as_str(), index as u32, video_id.unwrap_or(""));
            best_effort(
                "Video generated event",
                self.notifier.notify(&schedule.user_id, &event),
            )
            .await;
            metrics::record_post_processed("completed");
        } else {
            warn!(schedule_id = %id, index, "Post reported failed by the video backend");
            let event =
                NotifyEvent::post_failed(id.as_str(), index as u32, "Video generation failed");
            best_effort(
                "Post failed event",
                self.notifier.notify(&schedule.user_id, &event),
            )
            .await;
            metrics::record_post_processed("failed");
        }

        if schedule.is_fully_resolved() {
            info!(schedule_id = %id, "All posts resolved, schedule complete");
            best_effort(
                "Schedule complete email",
                self.mailer.send(
                    &schedule.email,
                    EmailTemplate::ScheduleComplete,
                    serde_json::json!({}),
                ),
            )
            .await;
            let event = NotifyEvent::schedule_complete(id.as_str());
            best_effort(
                "Schedule complete event",
                self.notifier.notify(&schedule.user_id, &event),
            )
            .await;
        }

        Ok(())
    }

    // =========================================================================
    // Background enrichment
    // =========================================================================

    /// Run caption enrichment as a detached job with a failure boundary.
    ///
    /// A pipeline error flips the schedule to failed and emits the
    /// schedule-failed event; nothing propagates back to the creator.
    fn spawn_enrichment(&self, schedule: &Schedule) {
        let pipeline = self.pipeline.clone();
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let settings_reader = Arc::clone(&self.settings);
        let id = schedule.schedule_id.clone();
        let user_id = schedule.user_id.clone();
        let total = schedule.posts.len() as u32;

        tokio::spawn(async move {
            let settings = match settings_reader.video_settings(&user_id).await {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        error = %e,
                        "Using default settings for enrichment"
                    );
                    UserVideoSettings::default()
                }
            };

            if let Err(e) = pipeline.run(&id, &user_id, &settings, total).await {
                error!(schedule_id = %id, error = %e, "Caption enrichment job failed");
                if let Err(store_err) = store.set_status(&id, ScheduleStatus::Failed).await {
                    error!(
                        schedule_id = %id,
                        error = %store_err,
                        "Could not mark schedule failed"
                    );
                }
                let event = NotifyEvent::schedule_failed(id.as_str(), e.to_string());
                if let Err(notify_err) = notifier.notify(&user_id, &event).await {
                    warn!(
                        schedule_id = %id,
                        error = %notify_err,
                        "Schedule failure event not delivered"
                    );
                }
            }
        });
    }
}
