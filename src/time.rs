//! Timestamp resolution and latency computation
//!
//! Vendors report instants as epoch seconds, native datetimes, or RFC 3339
//! strings. Everything resolves to `DateTime<Utc>` and renders as ISO-8601
//! with microsecond precision and a `Z` suffix. An unresolvable input yields
//! `None` ("timestamp unavailable"), never epoch zero.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::value::PayloadValue;

/// Render an instant as UTC ISO-8601 (microsecond precision).
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Resolve a payload value to an absolute instant.
///
/// Numeric input is interpreted as Unix epoch seconds; text must parse as
/// RFC 3339. Anything else is unavailable.
pub fn resolve_instant(value: &PayloadValue) -> Option<DateTime<Utc>> {
    match value {
        PayloadValue::Int(secs) => DateTime::from_timestamp(*secs, 0),
        PayloadValue::Float(secs) if secs.is_finite() => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        }
        PayloadValue::Timestamp(dt) => Some(*dt),
        PayloadValue::Text(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        _ => None,
    }
}

/// Format a payload value as an ISO-8601 UTC string, `None` if unresolvable.
pub fn format_timestamp(value: &PayloadValue) -> Option<String> {
    resolve_instant(value).map(|dt| to_iso(&dt))
}

/// Latency in seconds between two instants.
///
/// Omitted when either endpoint is unavailable; callers must not substitute
/// zero for a missing latency.
pub fn latency_seconds(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<f64> {
    let (start, end) = (start?, end?);
    let micros = end.signed_duration_since(start).num_microseconds()?;
    Some(micros as f64 / 1e6)
}
