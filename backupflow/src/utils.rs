//! Operation ids and wall-clock helpers.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A UTC timestamp.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Generates a time-ordered id for one maintenance operation.
#[must_use]
pub fn generate_operation_id() -> Uuid {
    Uuid::now_v7()
}

/// Formats a duration in whole seconds as `HH:MM:SS`.
///
/// Negative durations format as zero; hours are not wrapped.
#[must_use]
pub fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

/// Formats the time between two instants as `HH:MM:SS`.
#[must_use]
pub fn elapsed_between(start: Timestamp, end: Timestamp) -> String {
    format_elapsed((end - start).num_seconds())
}
