//! Subscription and quota models (read-only from this service).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A user's billing subscription as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Subscription {
    /// Plan identifier ("starter", "growth", ...)
    pub plan: String,

    /// Billing status ("active", "canceled", "past_due", ...)
    pub status: String,

    /// End of the current billing period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<DateTime<Utc>>,

    /// Videos included per period
    #[serde(default)]
    pub video_limit: u32,

    /// Videos consumed this period
    #[serde(default)]
    pub videos_used: u32,
}

impl Subscription {
    /// Whether the subscription authorizes new work at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.status != "active" {
            return false;
        }
        match self.current_period_end {
            Some(end) => end > now,
            None => true,
        }
    }
}

/// Quota answer from the subscription reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoQuota {
    pub can_create: bool,
    pub limit: u32,
    pub remaining: u32,
}

impl VideoQuota {
    /// Human-readable usage line for limit-reached messaging.
    pub fn usage_summary(&self) -> String {
        let used = self.limit.saturating_sub(self.remaining);
        format!("Monthly video limit reached ({} of {} used)", used, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_subscription_active_window() {
        let now = Utc::now();
        let sub = Subscription {
            plan: "growth".to_string(),
            status: "active".to_string(),
            current_period_end: Some(now + Duration::days(10)),
            video_limit: 12,
            videos_used: 3,
        };
        assert!(sub.is_active(now));

        let expired = Subscription {
            current_period_end: Some(now - Duration::days(1)),
            ..sub.clone()
        };
        assert!(!expired.is_active(now));

        let canceled = Subscription {
            status: "canceled".to_string(),
            ..sub
        };
        assert!(!canceled.is_active(now));
    }

    #[test]
    fn test_quota_summary() {
        let quota = VideoQuota {
            can_create: false,
            limit: 12,
            remaining: 0,
        };
        assert_eq!(quota.usage_summary(), "Monthly video limit reached (12 of 12 used)");
    }
}
