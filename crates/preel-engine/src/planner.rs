//! Slot planning: recurrence rule + trend pool -> concrete posts.
//!
//! The planner walks the schedule window a calendar day at a time,
//! resolves each matching wall-clock time to a UTC instant in the
//! schedule's timezone and pairs the surviving slots with trends from
//! the pool, in order.

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

use preel_models::{Post, RecurrenceRule, Trend};

use crate::error::EngineResult;

/// Slots closer than this to now are dropped; there would not be enough
/// time to generate the video before the posting moment.
pub const MIN_LEAD_MINUTES: i64 = 40;

/// UTC instants for every slot in the window that clears the lead time.
///
/// Walks each calendar day from the window start to its end inclusive
/// and emits the recurrence times that land on that weekday, in entry
/// order. Slots inside [`MIN_LEAD_MINUTES`] of `now` are dropped.
pub fn slot_times(
    rule: &RecurrenceRule,
    tz: Tz,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let min_start = now + Duration::minutes(MIN_LEAD_MINUTES);
    let last_day = end_date.date_naive();
    let mut day = start_date.date_naive();
    let mut times = Vec::new();
    let mut skipped = 0u32;

    while day <= last_day {
        for time in rule.times_for(day.weekday()) {
            let scheduled = resolve_local(tz, day.and_time(time));
            if scheduled < min_start {
                skipped += 1;
                continue;
            }
            times.push(scheduled);
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    if skipped > 0 {
        debug!(skipped, "Dropped slots inside the posting lead time");
    }
    times
}

/// Pair slot times with trends to produce the planned posts.
///
/// Each surviving slot consumes exactly one trend from the pool, in
/// pool order; skipped slots consume nothing. Planning stops as soon
/// as the pool runs out. A trend with missing content aborts the plan.
pub fn plan(
    rule: &RecurrenceRule,
    tz: Tz,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    trend_pool: &[Trend],
    now: DateTime<Utc>,
) -> EngineResult<Vec<Post>> {
    let times = slot_times(rule, tz, start_date, end_date, now);
    let mut pool = trend_pool.iter();
    let mut posts = Vec::with_capacity(times.len().min(trend_pool.len()));

    for scheduled_for in times {
        let trend = match pool.next() {
            Some(trend) => trend,
            None => {
                debug!(planned = posts.len(), "Trend pool exhausted, stopping");
                break;
            }
        };
        trend.validate()?;
        posts.push(Post::from_trend(trend, scheduled_for));
    }

    Ok(posts)
}

/// Re-assign slot times to pending posts after a cadence change.
///
/// Started and finished posts keep their slots; each pending post takes
/// the next slot of the new rule, in index order. Pending posts beyond
/// the new slot supply keep their previous times.
pub fn retime_pending(
    posts: &mut [Post],
    rule: &RecurrenceRule,
    tz: Tz,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    now: DateTime<Utc>,
) {
    let mut fresh = slot_times(rule, tz, start_date, end_date, now).into_iter();
    for post in posts.iter_mut().filter(|p| p.is_pending()) {
        match fresh.next() {
            Some(scheduled_for) => post.scheduled_for = scheduled_for,
            None => {
                debug!("New cadence has fewer slots, keeping remaining times");
                break;
            }
        }
    }
}

/// Resolve a wall-clock datetime in `tz` to a UTC instant.
///
/// Around DST transitions: an ambiguous time takes its first occurrence,
/// a non-existent time is pushed one hour past the gap.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    if tz == Tz::UTC {
        return Utc.from_utc_datetime(&local);
    }

    match tz.from_local_datetime(&local) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
        chrono::LocalResult::None => {
            let shifted = local + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
                chrono::LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
                chrono::LocalResult::None => Utc.from_utc_datetime(&local),
            }
        }
    }
}
