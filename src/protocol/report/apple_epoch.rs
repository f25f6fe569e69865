//! Conversions for Apple's reference date, 2001-01-01T00:00:00Z, which on-device report
//! timestamps count from.

use chrono::{DateTime, Utc};

/// Seconds between the Unix epoch and the Apple reference date (11323 days).
pub const OFFSET_SECONDS: i64 = 978_307_200;

/// Interpret seconds since the reference date.
pub fn to_datetime(seconds: i32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(seconds) + OFFSET_SECONDS, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Seconds since the reference date, saturating at the bounds of an `i32`.
pub fn from_datetime(timestamp: &DateTime<Utc>) -> i32 {
    let seconds = timestamp.timestamp() - OFFSET_SECONDS;
    seconds.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
