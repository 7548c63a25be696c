//! Publication date parsing.
//!
//! Feeds in the wild put almost anything in `<pubDate>`. Each strategy below
//! cuts a fixed character window out of the raw string and applies exactly
//! one format; the first strategy that parses wins. Offsets and zone names
//! are ignored, timestamps are kept as written.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// A pure parse attempt: raw `<pubDate>` text in, timestamp out.
pub type DateStrategy = fn(&str) -> Option<NaiveDateTime>;

/// Tried in this order.
pub const DATE_STRATEGIES: [(&str, DateStrategy); 5] = [
    ("rfc822", rfc822),
    ("rfc822-short-year", rfc822_short_year),
    ("iso8601", iso8601),
    ("iso8601-space", iso8601_space),
    ("rfc822-trailing", rfc822_trailing),
];

/// Placeholder for "no usable date": 1900-01-01T00:00:00.
pub fn sentinel() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

/// Runs [`DATE_STRATEGIES`] in order and returns the first success.
pub fn parse_pub_date(raw: &str) -> Option<NaiveDateTime> {
    DATE_STRATEGIES.iter().find_map(|(name, strategy)| {
        let parsed = strategy(raw)?;
        tracing::trace!(strategy = *name, raw, "Date parsed");
        Some(parsed)
    })
}

/// `Tue, 12 Oct 2021 17:06:02 +0300`
fn rfc822(raw: &str) -> Option<NaiveDateTime> {
    parse_four_digit_year(&char_window(raw, 5, 25))
}

/// `Tue, 12 Oct 21 17:06:02 +0300`
fn rfc822_short_year(raw: &str) -> Option<NaiveDateTime> {
    parse(&char_window(raw, 5, 23), "%d %b %y %H:%M:%S")
}

/// `2021-10-12T17:06:02Z`, `2021-10-12T17:06:02+03:00`
fn iso8601(raw: &str) -> Option<NaiveDateTime> {
    parse(&char_window(raw, 0, 19), "%Y-%m-%dT%H:%M:%S")
}

/// `2021-10-12 17:06:02`
fn iso8601_space(raw: &str) -> Option<NaiveDateTime> {
    parse(raw, "%Y-%m-%d %H:%M:%S")
}

/// `Tuesday, 12 Oct 2021 17:06:02 GMT`: the 20 characters before a
/// 4-character zone suffix.
fn rfc822_trailing(raw: &str) -> Option<NaiveDateTime> {
    let len = raw.chars().count();
    parse_four_digit_year(&char_window(
        raw,
        len.saturating_sub(24),
        len.saturating_sub(4),
    ))
}

/// `%d %b %Y %H:%M:%S` where the year is exactly four ASCII digits.
/// chrono's `%Y` also takes `21` (year 21), which belongs to the short-year rule.
fn parse_four_digit_year(window: &str) -> Option<NaiveDateTime> {
    let year = window.split_whitespace().nth(2)?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    parse(window, "%d %b %Y %H:%M:%S")
}

fn parse(s: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, format).ok()
}

/// Characters `start..end`, clamped to the string (never panics).
fn char_window(s: &str, start: usize, end: usize) -> String {
    s.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}
