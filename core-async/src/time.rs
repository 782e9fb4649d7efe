//! Time-related helpers.
//!
//! Re-exports `tokio::time` for sleeping between sync pages and bounding
//! waits, plus wall-clock helpers used to stamp sync waves and log entries.

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
pub use tokio::time::{interval, sleep, sleep_until, timeout, Interval, Sleep, Timeout};

/// Error returned when [`timeout`] elapses.
pub use tokio::time::error::Elapsed as TimeoutError;

/// Returns the current time as seconds since UNIX_EPOCH.
///
/// A clock set before the epoch yields `0`.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// Returns the current time as milliseconds since UNIX_EPOCH.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
