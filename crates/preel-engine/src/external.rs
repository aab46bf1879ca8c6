//! Trait seams for everything the engine talks to.
//!
//! The planning, enrichment and processing flows only see these traits;
//! the concrete Firestore, storage, generation and notification clients
//! plug in behind them. That keeps the engine testable against in-memory
//! fakes and keeps the remote surface in one place.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use preel_ai::{
    CaptionRequest, ContentClient, CreateVideoRequest, GenerateVideoAck, GenerateVideoRequest,
    ScriptParts, SpeechClient, SpeechRequest, SpeechUrls, VideoClient,
};
use preel_firestore::{
    ScheduleRepository, SubscriptionRepository, ToFirestoreValue, TopicHistoryRepository,
    UserSettingsRepository, VersionedSchedule,
};
use preel_models::{
    CaptionSet, Frequency, NotifyEvent, Post, PostStatus, Recurrence, Schedule, ScheduleId,
    ScheduleStatus, Subscription, Trend, UserVideoSettings, VideoQuota,
};
use preel_notify::{EmailTemplate, Mailer, NotifyChannel};
use preel_storage::MusicLibrary;

use crate::error::EngineResult;

// =============================================================================
// Persistence
// =============================================================================

/// Schedule document store.
///
/// Writes that race with other writers take a `version` token from a
/// previous [`ScheduleStore::get_versioned`] read and fail with a version
/// conflict when the document moved underneath.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn create(&self, schedule: &Schedule) -> EngineResult<()>;

    async fn get(&self, id: &ScheduleId) -> EngineResult<Option<Schedule>>;

    async fn get_versioned(&self, id: &ScheduleId) -> EngineResult<Option<VersionedSchedule>>;

    async fn find_active_for_user(&self, user_id: &str) -> EngineResult<Option<Schedule>>;

    async fn list_active(&self) -> EngineResult<Vec<Schedule>>;

    async fn set_status(&self, id: &ScheduleId, status: ScheduleStatus) -> EngineResult<()>;

    async fn set_active(&self, id: &ScheduleId, active: bool) -> EngineResult<()>;

    async fn delete(&self, id: &ScheduleId) -> EngineResult<()>;

    /// Write one post's lifecycle fields. `error` and `video_id` are only
    /// written when supplied; `version` turns the write into a guarded one.
    async fn write_post_status(
        &self,
        id: &ScheduleId,
        index: usize,
        status: PostStatus,
        error: Option<&str>,
        video_id: Option<&str>,
        version: Option<&str>,
    ) -> EngineResult<()>;

    /// Write enriched captions for one post and mark them ready.
    async fn set_post_captions(
        &self,
        id: &ScheduleId,
        index: usize,
        captions: &CaptionSet,
    ) -> EngineResult<()>;

    /// Mark one post's caption enrichment as failed, recording why.
    async fn set_post_captions_failed(
        &self,
        id: &ScheduleId,
        index: usize,
        error: &str,
    ) -> EngineResult<()>;

    /// Overwrite one post's editable content fields in a guarded write.
    async fn update_post_content(
        &self,
        id: &ScheduleId,
        index: usize,
        post: &Post,
        version: &str,
    ) -> EngineResult<()>;

    /// Replace the whole posts array in a guarded write.
    async fn replace_posts(
        &self,
        id: &ScheduleId,
        posts: &[Post],
        version: &str,
    ) -> EngineResult<()>;

    /// Rewrite cadence fields together with the re-timed posts.
    async fn update_cadence(
        &self,
        id: &ScheduleId,
        frequency: Frequency,
        recurrence: &Recurrence,
        timezone: &str,
        posts: &[Post],
        version: &str,
    ) -> EngineResult<()>;
}

#[async_trait]
impl ScheduleStore for ScheduleRepository {
    async fn create(&self, schedule: &Schedule) -> EngineResult<()> {
        Ok(ScheduleRepository::create(self, schedule).await?)
    }

    async fn get(&self, id: &ScheduleId) -> EngineResult<Option<Schedule>> {
        Ok(ScheduleRepository::get(self, id).await?)
    }

    async fn get_versioned(&self, id: &ScheduleId) -> EngineResult<Option<VersionedSchedule>> {
        Ok(ScheduleRepository::get_versioned(self, id).await?)
    }

    async fn find_active_for_user(&self, user_id: &str) -> EngineResult<Option<Schedule>> {
        Ok(ScheduleRepository::find_active_for_user(self, user_id).await?)
    }

    async fn list_active(&self) -> EngineResult<Vec<Schedule>> {
        Ok(ScheduleRepository::list_active(self).await?)
    }

    async fn set_status(&self, id: &ScheduleId, status: ScheduleStatus) -> EngineResult<()> {
        Ok(ScheduleRepository::set_status(self, id, status).await?)
    }

    async fn set_active(&self, id: &ScheduleId, active: bool) -> EngineResult<()> {
        Ok(ScheduleRepository::set_active(self, id, active).await?)
    }

    async fn delete(&self, id: &ScheduleId) -> EngineResult<()> {
        Ok(ScheduleRepository::delete(self, id).await?)
    }

    async fn write_post_status(
        &self,
        id: &ScheduleId,
        index: usize,
        status: PostStatus,
        error: Option<&str>,
        video_id: Option<&str>,
        version: Option<&str>,
    ) -> EngineResult<()> {
        let mut updates = HashMap::new();
        updates.insert("status".to_string(), status.as_str().to_firestore_value());
        if let Some(message) = error {
            updates.insert("error".to_string(), message.to_firestore_value());
        }
        if let Some(vid) = video_id {
            updates.insert("video_id".to_string(), vid.to_firestore_value());
        }

        match version {
            Some(v) => Ok(self.update_post_fields_guarded(id, index, updates, v).await?),
            None => Ok(self.update_post_fields(id, index, updates).await?),
        }
    }

    async fn set_post_captions(
        &self,
        id: &ScheduleId,
        index: usize,
        captions: &CaptionSet,
    ) -> EngineResult<()> {
        Ok(ScheduleRepository::set_post_captions(self, id, index, captions).await?)
    }

    async fn set_post_captions_failed(
        &self,
        id: &ScheduleId,
        index: usize,
        error: &str,
    ) -> EngineResult<()> {
        Ok(ScheduleRepository::set_post_captions_failed(self, id, index, error).await?)
    }

    async fn update_post_content(
        &self,
        id: &ScheduleId,
        index: usize,
        post: &Post,
        version: &str,
    ) -> EngineResult<()> {
        let mut updates = HashMap::new();
        updates.insert(
            "description".to_string(),
            post.description.to_firestore_value(),
        );
        updates.insert("keypoints".to_string(), post.keypoints.to_firestore_value());
        for platform in preel_models::Platform::ALL {
            updates.insert(
                platform.caption_field().to_string(),
                post.captions.get(platform).to_firestore_value(),
            );
        }
        updates.insert(
            "caption_status".to_string(),
            post.caption_status.as_str().to_firestore_value(),
        );
        updates.insert("enhanced".to_string(), post.enhanced.to_firestore_value());

        Ok(self
            .update_post_fields_guarded(id, index, updates, version)
            .await?)
    }

    async fn replace_posts(
        &self,
        id: &ScheduleId,
        posts: &[Post],
        version: &str,
    ) -> EngineResult<()> {
        Ok(ScheduleRepository::replace_posts(self, id, posts, version).await?)
    }

    async fn update_cadence(
        &self,
        id: &ScheduleId,
        frequency: Frequency,
        recurrence: &Recurrence,
        timezone: &str,
        posts: &[Post],
        version: &str,
    ) -> EngineResult<()> {
        Ok(ScheduleRepository::update_cadence(
            self, id, frequency, recurrence, timezone, posts, version,
        )
        .await?)
    }
}

// =============================================================================
// Content generation
// =============================================================================

/// Trend and keypoint generation.
#[async_trait]
pub trait TrendGenerator: Send + Sync {
    /// Generate a batch of trend candidates.
    async fn generate(&self, count: u32, seed: Option<&str>) -> EngineResult<Vec<Trend>>;

    /// Generate fresh keypoints for one topic.
    async fn keypoints(&self, topic: &str) -> EngineResult<String>;
}

#[async_trait]
impl TrendGenerator for ContentClient {
    async fn generate(&self, count: u32, seed: Option<&str>) -> EngineResult<Vec<Trend>> {
        Ok(self.generate_trends(count, seed).await?)
    }

    async fn keypoints(&self, topic: &str) -> EngineResult<String> {
        Ok(ContentClient::keypoints(self, topic).await?)
    }
}

/// Per-platform caption generation.
#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    async fn generate(&self, request: &CaptionRequest) -> EngineResult<CaptionSet>;
}

#[async_trait]
impl CaptionGenerator for ContentClient {
    async fn generate(&self, request: &CaptionRequest) -> EngineResult<CaptionSet> {
        Ok(self.generate_captions(request).await?)
    }
}

/// Topics the user has already covered.
#[async_trait]
pub trait TopicHistory: Send + Sync {
    async fn existing_titles(&self, user_id: &str, email: &str) -> EngineResult<HashSet<String>>;
}

#[async_trait]
impl TopicHistory for TopicHistoryRepository {
    async fn existing_titles(&self, user_id: &str, email: &str) -> EngineResult<HashSet<String>> {
        Ok(TopicHistoryRepository::existing_titles(self, user_id, email).await?)
    }
}

// =============================================================================
// Video and speech
// =============================================================================

/// The two-step video generation API.
#[async_trait]
pub trait VideoApi: Send + Sync {
    /// Enhance a topic into a three-part script.
    async fn create_video(&self, request: &CreateVideoRequest) -> EngineResult<ScriptParts>;

    /// Kick off rendering; completion arrives out of band.
    async fn generate_video(
        &self,
        request: &GenerateVideoRequest,
    ) -> EngineResult<GenerateVideoAck>;
}

#[async_trait]
impl VideoApi for VideoClient {
    async fn create_video(&self, request: &CreateVideoRequest) -> EngineResult<ScriptParts> {
        Ok(VideoClient::create_video(self, request).await?)
    }

    async fn generate_video(
        &self,
        request: &GenerateVideoRequest,
    ) -> EngineResult<GenerateVideoAck> {
        Ok(VideoClient::generate_video(self, request).await?)
    }
}

/// Text-to-speech for the three script parts.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest) -> EngineResult<SpeechUrls>;
}

#[async_trait]
impl SpeechSynthesizer for SpeechClient {
    async fn synthesize(&self, request: &SpeechRequest) -> EngineResult<SpeechUrls> {
        Ok(SpeechClient::synthesize(self, request).await?)
    }
}

/// Background music track resolution.
#[async_trait]
pub trait MusicResolver: Send + Sync {
    /// Resolve a track name to a playable URL, `None` when unknown.
    async fn resolve_track(&self, track: &str) -> EngineResult<Option<String>>;
}

#[async_trait]
impl MusicResolver for MusicLibrary {
    async fn resolve_track(&self, track: &str) -> EngineResult<Option<String>> {
        Ok(MusicLibrary::resolve_track(self, track).await?)
    }
}

// =============================================================================
// User account state
// =============================================================================

/// Subscription and quota checks.
#[async_trait]
pub trait SubscriptionReader: Send + Sync {
    /// The user's subscription, only when currently active.
    async fn active_subscription(&self, user_id: &str) -> EngineResult<Option<Subscription>>;

    /// Whether the user may create another video this period.
    async fn can_create_video(&self, user_id: &str) -> EngineResult<VideoQuota>;
}

#[async_trait]
impl SubscriptionReader for SubscriptionRepository {
    async fn active_subscription(&self, user_id: &str) -> EngineResult<Option<Subscription>> {
        let now = Utc::now();
        Ok(self.get(user_id).await?.filter(|sub| sub.is_active(now)))
    }

    async fn can_create_video(&self, user_id: &str) -> EngineResult<VideoQuota> {
        Ok(self.video_quota(user_id).await?)
    }
}

/// Per-user video generation preferences.
#[async_trait]
pub trait SettingsReader: Send + Sync {
    async fn video_settings(&self, user_id: &str) -> EngineResult<UserVideoSettings>;
}

#[async_trait]
impl SettingsReader for UserSettingsRepository {
    async fn video_settings(&self, user_id: &str) -> EngineResult<UserVideoSettings> {
        Ok(self.get(user_id).await?)
    }
}

// =============================================================================
// Outbound messaging
// =============================================================================

/// Realtime event delivery to the user's frontend.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, event: &NotifyEvent) -> EngineResult<()>;
}

#[async_trait]
impl Notifier for NotifyChannel {
    async fn notify(&self, user_id: &str, event: &NotifyEvent) -> EngineResult<()> {
        Ok(self.publish(user_id, event).await?)
    }
}

/// Transactional email delivery.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(
        &self,
        to: &str,
        template: EmailTemplate,
        variables: serde_json::Value,
    ) -> EngineResult<()>;
}

#[async_trait]
impl MailSender for Mailer {
    async fn send(
        &self,
        to: &str,
        template: EmailTemplate,
        variables: serde_json::Value,
    ) -> EngineResult<()> {
        Ok(Mailer::send(self, to, template, variables).await?)
    }
}

// =============================================================================
// Dependency bundle
// =============================================================================

/// Everything the engine needs, bundled for injection.
#[derive(Clone)]
pub struct EngineDeps {
    pub store: Arc<dyn ScheduleStore>,
    pub trends: Arc<dyn TrendGenerator>,
    pub history: Arc<dyn TopicHistory>,
    pub captions: Arc<dyn CaptionGenerator>,
    pub video: Arc<dyn VideoApi>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub music: Arc<dyn MusicResolver>,
    pub subscriptions: Arc<dyn SubscriptionReader>,
    pub settings: Arc<dyn SettingsReader>,
    pub notifier: Arc<dyn Notifier>,
    pub mailer: Arc<dyn MailSender>,
}
