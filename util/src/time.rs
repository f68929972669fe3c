//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Number of microseconds in a second
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a UTC timestamp into a number of microseconds since the unix epoch.
pub fn timestamp_to_micros(timestamp: &chrono::DateTime<chrono::Utc>) -> i64 {
    timestamp.timestamp() * MICROS_PER_SECOND + timestamp.timestamp_subsec_micros() as i64
}
