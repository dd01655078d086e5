use std::time::Duration;

use chrono::{DateTime, TimeZone, Timelike};

/// Minutes between marks; marks fall on :00, :15, :30 and :45.
pub const MARK_INTERVAL_MINUTES: u32 = 15;

const MARK_INTERVAL_MS: u64 = MARK_INTERVAL_MINUTES as u64 * 60_000;

/// Time from `now` to the next mark. Never zero: standing exactly on a mark
/// yields a full interval.
pub fn until_next_mark<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let into_interval = u64::from(now.minute() % MARK_INTERVAL_MINUTES) * 60_000
        + u64::from(now.second()) * 1_000
        + u64::from(now.timestamp_subsec_millis().min(999));
    Duration::from_millis(MARK_INTERVAL_MS - into_interval)
}

pub fn is_on_mark<Tz: TimeZone>(at: &DateTime<Tz>) -> bool {
    at.minute() % MARK_INTERVAL_MINUTES == 0
}
