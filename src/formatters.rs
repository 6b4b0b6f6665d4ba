//! Text helpers for the display: timestamp normalization and sanitizing of
//! upstream strings before they are drawn.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Display format for timestamps, e.g. `2024-01-01 10:30 UTC`
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Default maximum length for sanitized strings
pub const MAX_DISPLAY_LEN: usize = 100;

/// Parse either an ISO 8601 date-time (with `Z`, a numeric offset or no
/// offset at all) or a `YYYY-MM-DD HH:MM:SS UTC` string.
///
/// Offsets are converted to UTC; a missing offset is taken as UTC.
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    let timestamp = timestamp.trim();
    if timestamp.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
            return Some(dt.with_timezone(&Utc));
        }
        return NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc());
    }

    let bare = timestamp.strip_suffix(" UTC").unwrap_or(timestamp);
    NaiveDateTime::parse_from_str(bare, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp for display as `YYYY-MM-DD HH:MM UTC`.
///
/// Input that cannot be parsed is returned unchanged; this never fails.
///
/// ```
/// use trmnl_fruit_lib::formatters::format_timestamp;
///
/// assert_eq!(format_timestamp("2024-01-01T10:30:00Z"), "2024-01-01 10:30 UTC");
/// assert_eq!(format_timestamp("2024-01-01 10:30:45 UTC"), "2024-01-01 10:30 UTC");
/// assert_eq!(format_timestamp("not-a-date"), "not-a-date");
/// ```
pub fn format_timestamp(timestamp: &str) -> String {
    match parse_timestamp(timestamp) {
        Some(dt) => dt.format(DISPLAY_FORMAT).to_string(),
        None => timestamp.to_string(),
    }
}

/// True if `timestamp` is in one of the accepted formats.
pub fn validate_timestamp(timestamp: &str) -> bool {
    parse_timestamp(timestamp).is_some()
}

/// Clean a string for display: drop non-printable characters, strip
/// `<...>` tags and truncate to `max_len` characters.
pub fn sanitize_string(input: &str, max_len: usize) -> String {
    let mut clean = String::with_capacity(input.len().min(max_len));
    // A lone '<' without a later '>' is kept as text
    let has_close = input.contains('>');
    let mut in_tag = false;
    let mut kept = 0;

    for ch in input.chars() {
        if kept == max_len {
            break;
        }
        match ch {
            '<' if !in_tag && has_close => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            c if c.is_control() => {}
            c => {
                clean.push(c);
                kept += 1;
            }
        }
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_iso_with_zulu() {
        assert_eq!(
            format_timestamp("2024-01-01T10:30:00Z"),
            "2024-01-01 10:30 UTC"
        );
    }

    #[test]
    fn test_format_iso_with_offset_converts_to_utc() {
        assert_eq!(
            format_timestamp("2024-01-01T12:30:00+02:00"),
            "2024-01-01 10:30 UTC"
        );
        assert_eq!(
            format_timestamp("2024-01-01T10:30:00.123456+00:00"),
            "2024-01-01 10:30 UTC"
        );
    }

    #[test]
    fn test_format_naive_iso() {
        assert_eq!(
            format_timestamp("2024-03-05T07:08:09"),
            "2024-03-05 07:08 UTC"
        );
    }

    #[test]
    fn test_format_utc_string() {
        assert_eq!(
            format_timestamp("2024-01-01 10:30:59 UTC"),
            "2024-01-01 10:30 UTC"
        );
        assert_eq!(
            format_timestamp("2024-01-01 10:30:59"),
            "2024-01-01 10:30 UTC"
        );
    }

    #[test]
    fn test_format_is_idempotent() {
        for input in ["2024-01-01T10:30:00Z", "2024-06-30 23:59:59 UTC"] {
            let once = format_timestamp(input);
            assert_eq!(format_timestamp(&once), once, "input {input}");
        }
    }

    #[test]
    fn test_malformed_input_unchanged() {
        assert_eq!(format_timestamp("not-a-date"), "not-a-date");
        assert_eq!(format_timestamp(""), "");
        assert_eq!(format_timestamp("2024-13-45T99:99:99Z"), "2024-13-45T99:99:99Z");
        assert_eq!(format_timestamp("Unknown"), "Unknown");
    }

    #[test]
    fn test_validate_timestamp() {
        assert!(validate_timestamp("2024-01-01T10:30:00Z"));
        assert!(validate_timestamp("2024-01-01 10:30:00 UTC"));
        assert!(!validate_timestamp("2024-01-01 10:30 UTC"));
        assert!(!validate_timestamp("yesterday"));
    }

    #[test]
    fn test_sanitize_strips_tags_and_controls() {
        assert_eq!(sanitize_string("<b>Apple</b>", 100), "Apple");
        assert_eq!(sanitize_string("Ban\u{0}ana\n", 100), "Banana");
        assert_eq!(sanitize_string("1 < 2", 100), "1 < 2");
    }

    #[test]
    fn test_sanitize_truncates() {
        assert_eq!(sanitize_string("Watermelon", 5), "Water");
        assert_eq!(sanitize_string(&"x".repeat(500), MAX_DISPLAY_LEN).len(), 100);
    }
}
