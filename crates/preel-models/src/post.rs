//! Scheduled post models and the post lifecycle state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Trend;

/// Lifecycle state of a scheduled post.
///
/// Transitions are monotonic: `pending -> processing -> completed | failed`.
/// Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Waiting for its scheduled time
    #[default]
    Pending,
    /// Video generation is in flight
    Processing,
    /// Video was generated
    Completed,
    /// Generation failed or was rejected by a gate
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Processing => "processing",
            PostStatus::Completed => "completed",
            PostStatus::Failed => "failed",
        }
    }

    /// Parse from the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PostStatus::Pending),
            "processing" => Some(PostStatus::Processing),
            "completed" => Some(PostStatus::Completed),
            "failed" => Some(PostStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Completed | PostStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: PostStatus) -> bool {
        matches!(
            (self, next),
            (PostStatus::Pending, PostStatus::Processing)
                | (PostStatus::Processing, PostStatus::Completed)
                | (PostStatus::Processing, PostStatus::Failed)
        )
    }
}

/// Enrichment state of a post's captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStatus {
    /// Placeholder captions, enrichment not finished
    #[default]
    Pending,
    /// Platform captions written
    Ready,
    /// Enrichment failed for this post
    Failed,
}

impl CaptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionStatus::Pending => "pending",
            CaptionStatus::Ready => "ready",
            CaptionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CaptionStatus::Pending),
            "ready" => Some(CaptionStatus::Ready),
            "failed" => Some(CaptionStatus::Failed),
            _ => None,
        }
    }
}

/// Social platform a caption targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Instagram,
    Facebook,
    Tiktok,
    Linkedin,
    Twitter,
    Youtube,
}

impl Platform {
    /// All platforms in stored-field order.
    pub const ALL: [Platform; 6] = [
        Platform::Instagram,
        Platform::Facebook,
        Platform::Tiktok,
        Platform::Linkedin,
        Platform::Twitter,
        Platform::Youtube,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Tiktok => "tiktok",
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Youtube => "youtube",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "instagram" => Some(Platform::Instagram),
            "facebook" => Some(Platform::Facebook),
            "tiktok" => Some(Platform::Tiktok),
            "linkedin" => Some(Platform::Linkedin),
            "twitter" => Some(Platform::Twitter),
            "youtube" => Some(Platform::Youtube),
            _ => None,
        }
    }

    /// Stored field name for this platform's caption.
    pub fn caption_field(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram_caption",
            Platform::Facebook => "facebook_caption",
            Platform::Tiktok => "tiktok_caption",
            Platform::Linkedin => "linkedin_caption",
            Platform::Twitter => "twitter_caption",
            Platform::Youtube => "youtube_caption",
        }
    }

    /// Maximum caption length (characters) accepted by the platform.
    pub fn max_caption_len(&self) -> usize {
        match self {
            Platform::Instagram => 2200,
            Platform::Facebook => 5000,
            Platform::Tiktok => 2200,
            Platform::Linkedin => 3000,
            Platform::Twitter => 280,
            Platform::Youtube => 5000,
        }
    }
}

/// The six per-platform captions of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct CaptionSet {
    #[serde(default)]
    pub instagram_caption: String,
    #[serde(default)]
    pub facebook_caption: String,
    #[serde(default)]
    pub tiktok_caption: String,
    #[serde(default)]
    pub linkedin_caption: String,
    #[serde(default)]
    pub twitter_caption: String,
    #[serde(default)]
    pub youtube_caption: String,
}

impl CaptionSet {
    /// Placeholder captions used until enrichment runs.
    ///
    /// Format: `{description} - {keypoints}`, truncated per platform.
    pub fn placeholder(description: &str, keypoints: &str) -> Self {
        let text = format!("{} - {}", description, keypoints);
        let mut set = Self::default();
        for platform in Platform::ALL {
            set.set(platform, text.clone());
        }
        set
    }

    /// Caption for a platform.
    pub fn get(&self, platform: Platform) -> &str {
        match platform {
            Platform::Instagram => &self.instagram_caption,
            Platform::Facebook => &self.facebook_caption,
            Platform::Tiktok => &self.tiktok_caption,
            Platform::Linkedin => &self.linkedin_caption,
            Platform::Twitter => &self.twitter_caption,
            Platform::Youtube => &self.youtube_caption,
        }
    }

    /// Set a platform caption, truncated to the platform ceiling.
    pub fn set(&mut self, platform: Platform, text: impl Into<String>) {
        let text = truncate_caption(text.into(), platform.max_caption_len());
        let slot = match platform {
            Platform::Instagram => &mut self.instagram_caption,
            Platform::Facebook => &mut self.facebook_caption,
            Platform::Tiktok => &mut self.tiktok_caption,
            Platform::Linkedin => &mut self.linkedin_caption,
            Platform::Twitter => &mut self.twitter_caption,
            Platform::Youtube => &mut self.youtube_caption,
        };
        *slot = text;
    }

    /// True when every platform caption is non-empty.
    pub fn is_complete(&self) -> bool {
        Platform::ALL
            .iter()
            .all(|p| !self.get(*p).trim().is_empty())
    }
}

/// Truncate a caption to `max` characters on a char boundary.
pub fn truncate_caption(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        text
    } else {
        text.chars().take(max).collect()
    }
}

/// A single planned post embedded in a schedule document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Post {
    /// Topic text
    pub description: String,

    /// Supporting keypoints for the script
    pub keypoints: String,

    /// UTC instant the post should go out
    pub scheduled_for: DateTime<Utc>,

    /// Lifecycle state
    #[serde(default)]
    pub status: PostStatus,

    /// Error message from the last failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Remote video id once generation completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,

    /// Per-platform captions
    #[serde(flatten)]
    pub captions: CaptionSet,

    /// Enrichment state of the captions
    #[serde(default)]
    pub caption_status: CaptionStatus,

    /// Whether enrichment has written real captions
    #[serde(default)]
    pub enhanced: bool,
}

impl Post {
    /// Build a fresh pending post from a trend and its slot time.
    ///
    /// Captions start as placeholders; enrichment replaces them later.
    pub fn from_trend(trend: &Trend, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            description: trend.description.clone(),
            keypoints: trend.keypoints.clone(),
            scheduled_for,
            status: PostStatus::Pending,
            error: None,
            video_id: None,
            captions: CaptionSet::placeholder(&trend.description, &trend.keypoints),
            caption_status: CaptionStatus::Pending,
            enhanced: false,
        }
    }

    /// Whether the post still waits for its slot.
    pub fn is_pending(&self) -> bool {
        self.status == PostStatus::Pending
    }

    /// Whether the post is due within `lead` of `now`.
    pub fn is_due(&self, now: DateTime<Utc>, lead: chrono::Duration) -> bool {
        self.is_pending() && self.scheduled_for <= now + lead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Trend;

    fn trend() -> Trend {
        Trend {
            description: "Staging tips for small condos".to_string(),
            keypoints: "declutter; neutral palette; mirrors".to_string(),
            captions: CaptionSet::placeholder("Staging tips for small condos", "declutter"),
        }
    }

    #[test]
    fn test_status_transitions() {
        assert!(PostStatus::Pending.can_transition_to(PostStatus::Processing));
        assert!(PostStatus::Processing.can_transition_to(PostStatus::Completed));
        assert!(PostStatus::Processing.can_transition_to(PostStatus::Failed));

        assert!(!PostStatus::Pending.can_transition_to(PostStatus::Completed));
        assert!(!PostStatus::Completed.can_transition_to(PostStatus::Processing));
        assert!(!PostStatus::Failed.can_transition_to(PostStatus::Pending));
        assert!(!PostStatus::Processing.can_transition_to(PostStatus::Processing));
    }

    #[test]
    fn test_placeholder_captions() {
        let set = CaptionSet::placeholder("Open house checklist", "photos; signage");
        for platform in Platform::ALL {
            assert_eq!(set.get(platform), "Open house checklist - photos; signage");
        }
        assert!(set.is_complete());
    }

    #[test]
    fn test_caption_truncation() {
        let mut set = CaptionSet::default();
        let long = "x".repeat(5000);
        set.set(Platform::Twitter, long.clone());
        assert_eq!(set.get(Platform::Twitter).chars().count(), 280);

        set.set(Platform::Youtube, long);
        assert_eq!(set.get(Platform::Youtube).chars().count(), 5000);
    }

    #[test]
    fn test_post_from_trend() {
        let at = Utc::now();
        let post = Post::from_trend(&trend(), at);

        assert_eq!(post.status, PostStatus::Pending);
        assert_eq!(post.caption_status, CaptionStatus::Pending);
        assert!(!post.enhanced);
        assert_eq!(post.scheduled_for, at);
        assert!(post
            .captions
            .get(Platform::Instagram)
            .starts_with("Staging tips"));
    }

    #[test]
    fn test_post_due_window() {
        let now = Utc::now();
        let mut post = Post::from_trend(&trend(), now + chrono::Duration::minutes(20));

        assert!(post.is_due(now, chrono::Duration::minutes(30)));
        assert!(!post.is_due(now, chrono::Duration::minutes(10)));

        post.status = PostStatus::Completed;
        assert!(!post.is_due(now, chrono::Duration::minutes(30)));
    }
}
