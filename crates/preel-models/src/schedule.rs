//! Schedule document model and recurrence rules.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::Post;

/// Unique identifier for a schedule document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ScheduleId(pub String);

impl ScheduleId {
    /// Generate a new random schedule ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScheduleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Posting cadence over the one-month horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    OnceWeek,
    TwiceWeek,
    ThreeWeek,
    Daily,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::OnceWeek => "once_week",
            Frequency::TwiceWeek => "twice_week",
            Frequency::ThreeWeek => "three_week",
            Frequency::Daily => "daily",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "once_week" => Some(Frequency::OnceWeek),
            "twice_week" => Some(Frequency::TwiceWeek),
            "three_week" => Some(Frequency::ThreeWeek),
            "daily" => Some(Frequency::Daily),
            _ => None,
        }
    }

    /// Recurrence entries expected per week, `None` for daily.
    pub fn slots_per_week(&self) -> Option<u32> {
        match self {
            Frequency::OnceWeek => Some(1),
            Frequency::TwiceWeek => Some(2),
            Frequency::ThreeWeek => Some(3),
            Frequency::Daily => None,
        }
    }

    /// Total posts targeted for a horizon of `days_diff` whole days.
    ///
    /// Weekly cadences scale with `ceil(days_diff / 7)` weeks; daily
    /// targets one post per day.
    pub fn slot_target(&self, days_diff: i64) -> u32 {
        if days_diff <= 0 {
            return 0;
        }
        let weeks = ((days_diff + 6) / 7) as u32;
        match self {
            Frequency::OnceWeek => weeks,
            Frequency::TwiceWeek => 2 * weeks,
            Frequency::ThreeWeek => 3 * weeks,
            Frequency::Daily => days_diff as u32,
        }
    }
}

/// Overall enrichment state of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Captions are still being generated
    #[default]
    Processing,
    /// All posts enriched, schedule live
    Ready,
    /// The enrichment job itself died
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Processing => "processing",
            ScheduleStatus::Ready => "ready",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(ScheduleStatus::Processing),
            "ready" => Some(ScheduleStatus::Ready),
            "failed" => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }
}

/// Raw recurrence preference as submitted and stored.
///
/// `days` holds weekday names, `times` holds `HH:MM` wall-clock strings.
/// The arrays are index-aligned: the slot on `days[i]` fires at `times[i]`.
/// Daily cadences use `times[0]` for every day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Recurrence {
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub times: Vec<String>,
}

impl Recurrence {
    pub fn new(days: Vec<String>, times: Vec<String>) -> Self {
        Self { days, times }
    }
}

/// Errors produced while validating schedule input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("recurrence needs at least one time")]
    EmptyTimes,

    #[error("recurrence needs at least one day")]
    EmptyDays,

    #[error("recurrence days ({days}) and times ({times}) must be index-aligned")]
    LengthMismatch { days: usize, times: usize },

    #[error("{frequency} expects {expected} recurrence day(s), got {got}")]
    WrongDayCount {
        frequency: &'static str,
        expected: u32,
        got: usize,
    },

    #[error("unknown weekday name: {0}")]
    InvalidWeekday(String),

    #[error("time must be HH:MM, got: {0}")]
    InvalidTime(String),

    #[error("unknown IANA timezone: {0}")]
    UnknownTimezone(String),
}

/// Parsed, validated recurrence ready for slot planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceRule {
    /// One slot every day at a fixed wall-clock time.
    Daily { time: NaiveTime },
    /// Slots on specific weekdays, each with its own time.
    Weekly { slots: Vec<(Weekday, NaiveTime)> },
}

impl RecurrenceRule {
    /// Parse and validate raw recurrence input for a frequency.
    pub fn parse(frequency: Frequency, recurrence: &Recurrence) -> Result<Self, RecurrenceError> {
        if recurrence.times.is_empty() {
            return Err(RecurrenceError::EmptyTimes);
        }

        match frequency.slots_per_week() {
            None => {
                let time = parse_time(&recurrence.times[0])?;
                Ok(RecurrenceRule::Daily { time })
            }
            Some(expected) => {
                if recurrence.days.is_empty() {
                    return Err(RecurrenceError::EmptyDays);
                }
                if recurrence.days.len() != recurrence.times.len() {
                    return Err(RecurrenceError::LengthMismatch {
                        days: recurrence.days.len(),
                        times: recurrence.times.len(),
                    });
                }
                if recurrence.days.len() != expected as usize {
                    return Err(RecurrenceError::WrongDayCount {
                        frequency: frequency.as_str(),
                        expected,
                        got: recurrence.days.len(),
                    });
                }

                let mut slots = Vec::with_capacity(recurrence.days.len());
                for (day, time) in recurrence.days.iter().zip(&recurrence.times) {
                    slots.push((parse_weekday(day)?, parse_time(time)?));
                }
                Ok(RecurrenceRule::Weekly { slots })
            }
        }
    }

    /// Wall-clock times that fire on the given weekday, in entry order.
    pub fn times_for(&self, weekday: Weekday) -> Vec<NaiveTime> {
        match self {
            RecurrenceRule::Daily { time } => vec![*time],
            RecurrenceRule::Weekly { slots } => slots
                .iter()
                .filter(|(day, _)| *day == weekday)
                .map(|(_, time)| *time)
                .collect(),
        }
    }
}

/// Parse a weekday name ("Monday", "mon", case-insensitive).
pub fn parse_weekday(name: &str) -> Result<Weekday, RecurrenceError> {
    match name.trim().to_lowercase().as_str() {
        "monday" | "mon" => Ok(Weekday::Mon),
        "tuesday" | "tue" => Ok(Weekday::Tue),
        "wednesday" | "wed" => Ok(Weekday::Wed),
        "thursday" | "thu" => Ok(Weekday::Thu),
        "friday" | "fri" => Ok(Weekday::Fri),
        "saturday" | "sat" => Ok(Weekday::Sat),
        "sunday" | "sun" => Ok(Weekday::Sun),
        _ => Err(RecurrenceError::InvalidWeekday(name.to_string())),
    }
}

/// Parse an `HH:MM` wall-clock string.
pub fn parse_time(value: &str) -> Result<NaiveTime, RecurrenceError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| RecurrenceError::InvalidTime(value.to_string()))
}

/// Parse and validate an IANA timezone id.
pub fn parse_timezone(tz: &str) -> Result<Tz, RecurrenceError> {
    tz.parse::<Tz>()
        .map_err(|_| RecurrenceError::UnknownTimezone(tz.to_string()))
}

/// A user's posting schedule stored as a single document.
///
/// At most one schedule per user is active at a time. Posts are embedded
/// and addressed by index.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Schedule {
    /// Document id
    pub schedule_id: ScheduleId,

    /// Owning user
    pub user_id: String,

    /// Contact address for lifecycle emails
    pub email: String,

    /// IANA timezone the recurrence times are expressed in
    pub timezone: String,

    /// Posting cadence
    pub frequency: Frequency,

    /// Raw recurrence preference
    pub recurrence: Recurrence,

    /// Horizon start (UTC)
    pub start_date: DateTime<Utc>,

    /// Horizon end, one month after start (UTC)
    pub end_date: DateTime<Utc>,

    /// Whether the schedule is live
    #[serde(default)]
    pub is_active: bool,

    /// Enrichment state
    #[serde(default)]
    pub status: ScheduleStatus,

    /// Planned posts in slot order
    #[serde(default)]
    pub posts: Vec<Post>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Build a fresh active schedule with planned posts.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        timezone: impl Into<String>,
        frequency: Frequency,
        recurrence: Recurrence,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        posts: Vec<Post>,
    ) -> Self {
        let now = Utc::now();
        Self {
            schedule_id: ScheduleId::new(),
            user_id: user_id.into(),
            email: email.into(),
            timezone: timezone.into(),
            frequency,
            recurrence,
            start_date,
            end_date,
            is_active: true,
            status: ScheduleStatus::Processing,
            posts,
            created_at: now,
            updated_at: now,
        }
    }

    /// Post at `index`, if present.
    pub fn post(&self, index: usize) -> Option<&Post> {
        self.posts.get(index)
    }

    /// True when no post can still run (all terminal).
    pub fn is_fully_resolved(&self) -> bool {
        self.posts.iter().all(|p| p.status.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_target_formulas() {
        // 30-day horizon spans 5 calendar weeks
        assert_eq!(Frequency::OnceWeek.slot_target(30), 5);
        assert_eq!(Frequency::TwiceWeek.slot_target(30), 10);
        assert_eq!(Frequency::ThreeWeek.slot_target(30), 15);
        assert_eq!(Frequency::Daily.slot_target(30), 30);

        // exact weeks
        assert_eq!(Frequency::OnceWeek.slot_target(28), 4);
        assert_eq!(Frequency::TwiceWeek.slot_target(28), 8);

        // degenerate horizon
        assert_eq!(Frequency::OnceWeek.slot_target(0), 0);
        assert_eq!(Frequency::Daily.slot_target(-3), 0);
    }

    #[test]
    fn test_rule_parse_weekly() {
        let recurrence = Recurrence::new(
            vec!["Monday".to_string(), "Thursday".to_string()],
            vec!["09:00".to_string(), "17:30".to_string()],
        );
        let rule = RecurrenceRule::parse(Frequency::TwiceWeek, &recurrence).unwrap();

        assert_eq!(
            rule.times_for(Weekday::Mon),
            vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()]
        );
        assert_eq!(
            rule.times_for(Weekday::Thu),
            vec![NaiveTime::from_hms_opt(17, 30, 0).unwrap()]
        );
        assert!(rule.times_for(Weekday::Fri).is_empty());
    }

    #[test]
    fn test_rule_same_day_twice() {
        let recurrence = Recurrence::new(
            vec!["Monday".to_string(), "monday".to_string()],
            vec!["09:00".to_string(), "18:00".to_string()],
        );
        let rule = RecurrenceRule::parse(Frequency::TwiceWeek, &recurrence).unwrap();

        assert_eq!(rule.times_for(Weekday::Mon).len(), 2);
    }

    #[test]
    fn test_rule_parse_daily_ignores_days() {
        let recurrence = Recurrence::new(vec![], vec!["08:15".to_string()]);
        let rule = RecurrenceRule::parse(Frequency::Daily, &recurrence).unwrap();

        for day in [Weekday::Mon, Weekday::Sat, Weekday::Sun] {
            assert_eq!(
                rule.times_for(day),
                vec![NaiveTime::from_hms_opt(8, 15, 0).unwrap()]
            );
        }
    }

    #[test]
    fn test_rule_rejects_mismatched_arrays() {
        let recurrence = Recurrence::new(
            vec!["Monday".to_string(), "Friday".to_string()],
            vec!["09:00".to_string()],
        );
        let err = RecurrenceRule::parse(Frequency::TwiceWeek, &recurrence).unwrap_err();
        assert!(matches!(err, RecurrenceError::LengthMismatch { days: 2, times: 1 }));
    }

    #[test]
    fn test_rule_rejects_wrong_day_count() {
        let recurrence = Recurrence::new(
            vec!["Monday".to_string(), "Friday".to_string()],
            vec!["09:00".to_string(), "10:00".to_string()],
        );
        let err = RecurrenceRule::parse(Frequency::OnceWeek, &recurrence).unwrap_err();
        assert!(matches!(err, RecurrenceError::WrongDayCount { expected: 1, got: 2, .. }));
    }

    #[test]
    fn test_rule_rejects_bad_input() {
        let bad_day = Recurrence::new(vec!["Moonday".to_string()], vec!["09:00".to_string()]);
        assert!(matches!(
            RecurrenceRule::parse(Frequency::OnceWeek, &bad_day),
            Err(RecurrenceError::InvalidWeekday(_))
        ));

        let bad_time = Recurrence::new(vec!["Monday".to_string()], vec!["9 am".to_string()]);
        assert!(matches!(
            RecurrenceRule::parse(Frequency::OnceWeek, &bad_time),
            Err(RecurrenceError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_parse_timezone() {
        assert!(parse_timezone("America/Los_Angeles").is_ok());
        assert!(parse_timezone("UTC").is_ok());
        assert!(matches!(
            parse_timezone("Mars/Olympus_Mons"),
            Err(RecurrenceError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn test_schedule_resolution() {
        let mut schedule = Schedule::new(
            "user1",
            "agent@example.com",
            "UTC",
            Frequency::OnceWeek,
            Recurrence::new(vec!["Monday".to_string()], vec!["09:00".to_string()]),
            Utc::now(),
            Utc::now(),
            vec![],
        );
        assert!(schedule.is_active);
        assert_eq!(schedule.status, ScheduleStatus::Processing);
        assert!(schedule.is_fully_resolved());

        let trend = crate::Trend {
            description: "t".to_string(),
            keypoints: "k".to_string(),
            captions: crate::CaptionSet::placeholder("t", "k"),
        };
        schedule.posts.push(crate::Post::from_trend(&trend, Utc::now()));
        assert!(!schedule.is_fully_resolved());
    }
}
