//! Timestamp helpers.
//!
//! The backend is not consistent about timestamp shapes: some endpoints send
//! RFC 3339 with an offset, others a bare local date-time, a few only a date.
//! Everything is normalised to a naive UTC date-time for sorting and display.
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Display format of the "Uploaded At" / "Completed At" columns.
pub const DATE_TIME_FORMAT: &str = "%d %b %Y %H:%M";

/// Parse a backend timestamp. Returns `None` for anything unrecognised.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn format_date_time(ts: &NaiveDateTime) -> String {
    ts.format(DATE_TIME_FORMAT).to_string()
}
