//! Timestamp utilities
//!
//! Registration arrival times are stored as integer milliseconds since the
//! Unix epoch so FIFO tiebreaks compare exactly, with no float rounding.

use chrono::{DateTime, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time as milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert epoch milliseconds to a UTC timestamp
///
/// Out-of-range values clamp to the epoch rather than panicking; the columns
/// holding these values are always written from `now_ms()`.
pub fn from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
}
