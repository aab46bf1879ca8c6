//! Shared data models for the PropReel scheduling backend.
//!
//! This crate provides Serde-serializable types for:
//! - Schedules, recurrence rules and posting frequencies
//! - Posts with lifecycle and caption enrichment state
//! - Generated trend topics
//! - Per-user video settings (avatar, voice, music, caption context)
//! - Subscriptions and video quotas
//! - Notification event schemas

pub mod notify;
pub mod post;
pub mod request;
pub mod schedule;
pub mod settings;
pub mod subscription;
pub mod trend;

// Re-export common types
pub use notify::{NotifyEvent, NotifyEventType};
pub use post::{
    truncate_caption, CaptionSet, CaptionStatus, Platform, Post, PostStatus,
};
pub use request::{
    CreateScheduleRequest, DuePost, UpdatePostRequest, UpdateScheduleRequest,
};
pub use schedule::{
    parse_time, parse_timezone, parse_weekday, Frequency, Recurrence, RecurrenceError,
    RecurrenceRule, Schedule, ScheduleId, ScheduleStatus,
};
pub use settings::{
    Avatar, AvatarKind, AvatarRef, SocialHandles, UserContext, UserVideoSettings, VoiceSettings,
};
pub use subscription::{Subscription, VideoQuota};
pub use trend::{normalize_title, IncompleteTrend, Trend};
