//! Parser for the timestamp inside a log line's leading bracketed field.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Layout of the observed application's zone-less timestamps.
const LOCAL_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
const LOCAL_LAYOUT_LEN: usize = "2006-01-02T15:04:05.000".len();

/// Extract the instant between the first `[` and the following `]`.
///
/// Two shapes are accepted: `YYYY-MM-DDTHH:MM:SS.mmm` without a zone,
/// interpreted as local time, and full RFC 3339 with a zone and optional
/// fractional seconds. Anything else, including missing brackets, yields
/// `None`; no other failure is signalled.
pub fn parse_bracketed_timestamp(line: &str) -> Option<DateTime<Local>> {
    let start = line.find('[')?;
    let rest = &line[start + 1..];
    let end = rest.find(']')?;
    let raw = &rest[..end];

    // Fast path: the zone-less millisecond layout is what the application
    // writes on every line.
    if raw.len() == LOCAL_LAYOUT_LEN {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, LOCAL_LAYOUT) {
            if let Some(local) = Local.from_local_datetime(&naive).earliest() {
                return Some(local);
            }
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|with_zone| with_zone.with_timezone(&Local))
}
