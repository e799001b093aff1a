//! Timestamp helpers.

use chrono::{SecondsFormat, Utc};

/// Returns the current time as nanoseconds since the Unix epoch.
#[must_use]
pub fn now_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000))
}

/// Returns the current time as an RFC3339 string with microseconds.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
