//! Notification event types.
//!
//! These events keep the payload shape the web client already consumes.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Notification event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotifyEventType {
    CaptionProgress,
    ScheduleReady,
    ScheduleFailed,
    PostProcessing,
    PostFailed,
    VideoInitiated,
    VideoGenerated,
    ScheduleComplete,
}

impl NotifyEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyEventType::CaptionProgress => "caption_progress",
            NotifyEventType::ScheduleReady => "schedule_ready",
            NotifyEventType::ScheduleFailed => "schedule_failed",
            NotifyEventType::PostProcessing => "post_processing",
            NotifyEventType::PostFailed => "post_failed",
            NotifyEventType::VideoInitiated => "video_initiated",
            NotifyEventType::VideoGenerated => "video_generated",
            NotifyEventType::ScheduleComplete => "schedule_complete",
        }
    }
}

/// Notification envelope published per user.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyEvent {
    /// Caption enrichment progress for a schedule
    CaptionProgress {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
        processed: u32,
        total: u32,
    },

    /// All captions written, schedule live
    ScheduleReady {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
    },

    /// The enrichment job itself died
    ScheduleFailed {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
        message: String,
    },

    /// A post entered video generation
    PostProcessing {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
        #[serde(rename = "postIndex")]
        post_index: u32,
        description: String,
    },

    /// A post failed a gate or a remote call
    PostFailed {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
        #[serde(rename = "postIndex")]
        post_index: u32,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Remote generation accepted the request
    VideoInitiated {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
        #[serde(rename = "postIndex")]
        post_index: u32,
    },

    /// Remote generation delivered a video
    VideoGenerated {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
        #[serde(rename = "postIndex")]
        post_index: u32,
        #[serde(rename = "videoId")]
        video_id: String,
    },

    /// The schedule's last post resolved
    ScheduleComplete {
        #[serde(rename = "scheduleId")]
        schedule_id: String,
    },
}

impl NotifyEvent {
    /// Create a caption progress event.
    pub fn caption_progress(schedule_id: impl Into<String>, processed: u32, total: u32) -> Self {
        NotifyEvent::CaptionProgress {
            schedule_id: schedule_id.into(),
            processed,
            total,
        }
    }

    /// Create a schedule ready event.
    pub fn schedule_ready(schedule_id: impl Into<String>) -> Self {
        NotifyEvent::ScheduleReady {
            schedule_id: schedule_id.into(),
        }
    }

    /// Create a schedule failed event.
    pub fn schedule_failed(schedule_id: impl Into<String>, message: impl Into<String>) -> Self {
        NotifyEvent::ScheduleFailed {
            schedule_id: schedule_id.into(),
            message: message.into(),
        }
    }

    /// Create a post processing event.
    pub fn post_processing(
        schedule_id: impl Into<String>,
        post_index: u32,
        description: impl Into<String>,
    ) -> Self {
        NotifyEvent::PostProcessing {
            schedule_id: schedule_id.into(),
            post_index,
            description: description.into(),
        }
    }

    /// Create a post failed event.
    pub fn post_failed(
        schedule_id: impl Into<String>,
        post_index: u32,
        message: impl Into<String>,
    ) -> Self {
        NotifyEvent::PostFailed {
            schedule_id: schedule_id.into(),
            post_index,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a video initiated event.
    pub fn video_initiated(schedule_id: impl Into<String>, post_index: u32) -> Self {
        NotifyEvent::VideoInitiated {
            schedule_id: schedule_id.into(),
            post_index,
        }
    }

    /// Create a video generated event.
    pub fn video_generated(
        schedule_id: impl Into<String>,
        post_index: u32,
        video_id: impl Into<String>,
    ) -> Self {
        NotifyEvent::VideoGenerated {
            schedule_id: schedule_id.into(),
            post_index,
            video_id: video_id.into(),
        }
    }

    /// Create a schedule complete event.
    pub fn schedule_complete(schedule_id: impl Into<String>) -> Self {
        NotifyEvent::ScheduleComplete {
            schedule_id: schedule_id.into(),
        }
    }

    /// Get the event type.
    pub fn event_type(&self) -> NotifyEventType {
        match self {
            NotifyEvent::CaptionProgress { .. } => NotifyEventType::CaptionProgress,
            NotifyEvent::ScheduleReady { .. } => NotifyEventType::ScheduleReady,
            NotifyEvent::ScheduleFailed { .. } => NotifyEventType::ScheduleFailed,
            NotifyEvent::PostProcessing { .. } => NotifyEventType::PostProcessing,
            NotifyEvent::PostFailed { .. } => NotifyEventType::PostFailed,
            NotifyEvent::VideoInitiated { .. } => NotifyEventType::VideoInitiated,
            NotifyEvent::VideoGenerated { .. } => NotifyEventType::VideoGenerated,
            NotifyEvent::ScheduleComplete { .. } => NotifyEventType::ScheduleComplete,
        }
    }

    /// Schedule this event belongs to.
    pub fn schedule_id(&self) -> &str {
        match self {
            NotifyEvent::CaptionProgress { schedule_id, .. }
            | NotifyEvent::ScheduleReady { schedule_id }
            | NotifyEvent::ScheduleFailed { schedule_id, .. }
            | NotifyEvent::PostProcessing { schedule_id, .. }
            | NotifyEvent::PostFailed { schedule_id, .. }
            | NotifyEvent::VideoInitiated { schedule_id, .. }
            | NotifyEvent::VideoGenerated { schedule_id, .. }
            | NotifyEvent::ScheduleComplete { schedule_id } => schedule_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = NotifyEvent::caption_progress("sched1", 3, 9);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"caption_progress\""));
        assert!(json.contains("\"scheduleId\":\"sched1\""));
        assert!(json.contains("\"processed\":3"));
    }

    #[test]
    fn test_video_generated_fields() {
        let event = NotifyEvent::video_generated("sched1", 2, "vid_9");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"postIndex\":2"));
        assert!(json.contains("\"videoId\":\"vid_9\""));
    }

    #[test]
    fn test_event_type_mapping() {
        let event = NotifyEvent::schedule_complete("sched1");
        assert_eq!(event.event_type(), NotifyEventType::ScheduleComplete);
        assert_eq!(event.schedule_id(), "sched1");
    }
}
