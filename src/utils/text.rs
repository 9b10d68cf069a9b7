// src/utils/text.rs

//! Text and timestamp normalization.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// Marker appended to text cut at the length cap.
pub const ELLIPSIS: &str = "...";

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

/// Timestamp layouts that carry their own offset.
const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
];

/// Naive layouts, read as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Date-only layouts, read as midnight UTC.
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn squash_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce an HTML fragment to plain text capped at `max_len` graphemes.
///
/// Tags become spaces, entities are decoded and whitespace is collapsed.
/// Text over the cap keeps its first `max_len - 1` graphemes, loses trailing
/// whitespace and gets [`ELLIPSIS`] appended.
pub fn strip_html(value: &str, max_len: usize) -> String {
    if value.is_empty() {
        return String::new();
    }
    let without_tags = TAG_RE.replace_all(value, " ");
    let decoded = html_escape::decode_html_entities(&without_tags);
    let text = squash_whitespace(&decoded);
    truncate_graphemes(&text, max_len)
}

/// Cap `text` at `max_len` graphemes, marking the cut with [`ELLIPSIS`].
pub fn truncate_graphemes(text: &str, max_len: usize) -> String {
    if text.graphemes(true).count() <= max_len {
        return text.to_string();
    }
    let kept: String = text
        .graphemes(true)
        .take(max_len.saturating_sub(1))
        .collect();
    format!("{}{ELLIPSIS}", kept.trim_end())
}

/// Parse a loosely formatted timestamp into UTC.
///
/// Accepts RFC 3339, RFC 2822, ISO-like layouts with or without an offset
/// (no offset means UTC) and a handful of date-only layouts. Anything else
/// yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = raw.trim_end_matches('Z');
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Drop sub-second precision.
pub fn truncate_secs(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(0)
}

/// ISO-8601 UTC text with seconds precision and a `Z` suffix.
pub fn to_iso_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
