use chrono::{DateTime, TimeZone, Utc};

/// Truncate a timestamp to millisecond precision.
///
/// The store persists unix milliseconds, so anything finer would be lost
/// on the first round trip and version comparisons would disagree with
/// the in-memory value.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    from_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Current time at the precision the store persists.
pub fn now() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

/// Rebuild a timestamp from stored unix milliseconds.
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}
