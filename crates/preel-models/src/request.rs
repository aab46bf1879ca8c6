//! Service-surface request and result types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{Frequency, Platform, Recurrence, ScheduleId};

/// Request to create a schedule.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct CreateScheduleRequest {
    /// Owning user
    #[validate(length(min = 1))]
    pub user_id: String,

    /// Contact address for lifecycle emails
    #[validate(email)]
    pub email: String,

    /// IANA timezone id
    #[validate(length(min = 1))]
    pub timezone: String,

    /// Posting cadence
    pub frequency: Frequency,

    /// Weekday/time preference
    pub recurrence: Recurrence,

    /// Horizon start; defaults to now when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
}

/// Request to change an active schedule's cadence.
///
/// Only supplied fields change; pending posts are re-timed against the
/// resulting rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UpdateScheduleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl UpdateScheduleRequest {
    /// Whether the request changes anything at all.
    pub fn is_empty(&self) -> bool {
        self.frequency.is_none() && self.recurrence.is_none() && self.timezone.is_none()
    }
}

/// Request to edit a pending post.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UpdatePostRequest {
    /// New topic text; triggers keypoint and caption regeneration when it
    /// differs from the stored topic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_caption: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook_caption: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiktok_caption: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_caption: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_caption: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_caption: Option<String>,
}

impl UpdatePostRequest {
    /// Whether this edit changes the topic relative to the stored text.
    pub fn is_topic_change(&self, current_description: &str) -> bool {
        match &self.description {
            Some(new) => new.trim() != current_description.trim(),
            None => false,
        }
    }

    /// Captions explicitly supplied by the caller.
    pub fn supplied_captions(&self) -> Vec<(Platform, &str)> {
        let mut out = Vec::new();
        let pairs: [(Platform, &Option<String>); 6] = [
            (Platform::Instagram, &self.instagram_caption),
            (Platform::Facebook, &self.facebook_caption),
            (Platform::Tiktok, &self.tiktok_caption),
            (Platform::Linkedin, &self.linkedin_caption),
            (Platform::Twitter, &self.twitter_caption),
            (Platform::Youtube, &self.youtube_caption),
        ];
        for (platform, value) in pairs {
            if let Some(text) = value {
                out.push((platform, text.as_str()));
            }
        }
        out
    }

    /// Whether the request changes anything at all.
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.keypoints.is_none() && self.supplied_captions().is_empty()
    }
}

/// A pending post inside the dispatch window.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DuePost {
    pub schedule_id: ScheduleId,
    pub post_index: usize,
    pub user_id: String,
    pub email: String,
    pub description: String,
    pub scheduled_for: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let req = CreateScheduleRequest {
            user_id: "user1".to_string(),
            email: "agent@example.com".to_string(),
            timezone: "America/Los_Angeles".to_string(),
            frequency: Frequency::OnceWeek,
            recurrence: Recurrence::new(vec!["Monday".to_string()], vec!["09:00".to_string()]),
            start_date: None,
        };
        assert!(req.validate().is_ok());

        let bad_email = CreateScheduleRequest {
            email: "not-an-email".to_string(),
            ..req
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_topic_change_detection() {
        let edit = UpdatePostRequest {
            description: Some("New topic".to_string()),
            ..Default::default()
        };
        assert!(edit.is_topic_change("Old topic"));
        assert!(!edit.is_topic_change("New topic"));
        assert!(!edit.is_topic_change("  New topic "));

        let no_topic = UpdatePostRequest {
            keypoints: Some("fresh keypoints".to_string()),
            ..Default::default()
        };
        assert!(!no_topic.is_topic_change("Old topic"));
    }

    #[test]
    fn test_supplied_captions() {
        let edit = UpdatePostRequest {
            twitter_caption: Some("short".to_string()),
            youtube_caption: Some("long".to_string()),
            ..Default::default()
        };
        let supplied = edit.supplied_captions();
        assert_eq!(supplied.len(), 2);
        assert_eq!(supplied[0].0, Platform::Twitter);
        assert!(!edit.is_empty());
        assert!(UpdatePostRequest::default().is_empty());
    }
}
