//! Deadline math for activity invocations

use chrono::{DateTime, Duration, Utc};

/// Absolute deadline of an activity invocation.
///
/// The earlier of `scheduled_at + schedule_to_close` and
/// `started_at + start_to_close`. Timestamps come from each task, so callers
/// evaluate this per invocation.
pub fn activity_deadline(
    scheduled_at: DateTime<Utc>,
    schedule_to_close_seconds: i32,
    started_at: DateTime<Utc>,
    start_to_close_seconds: i32,
) -> DateTime<Utc> {
    let schedule_deadline = add_seconds(scheduled_at, schedule_to_close_seconds);
    let start_deadline = add_seconds(started_at, start_to_close_seconds);
    schedule_deadline.min(start_deadline)
}

fn add_seconds(at: DateTime<Utc>, seconds: i32) -> DateTime<Utc> {
    at.checked_add_signed(Duration::seconds(i64::from(seconds)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
