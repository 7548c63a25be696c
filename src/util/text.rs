use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

/// Upper bound, in characters, for any cleaned text field.
pub const MAX_TEXT_CHARS: usize = 1000;

/// Ellipsis string used for truncation
const ELLIPSIS: &str = "...";

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Non-greedy and single-line: a '<' without a '>' on the same line is kept
    PATTERN.get_or_init(|| Regex::new(r"<.+?>").expect("tag pattern is valid"))
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s{2,}|&nbsp;|\n").expect("whitespace pattern is valid"))
}

fn img_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<img.+?>").expect("img pattern is valid"))
}

fn src_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"src=["'](.*?)["']"#).expect("src pattern is valid"))
}

/// Turns feed markup into a single line of plain text.
///
/// In order: strip tags, trim, replace each run of two or more whitespace
/// characters (and every `&nbsp;` or newline) with one space, decode HTML
/// entities, then cap the result at [`MAX_TEXT_CHARS`] characters.
///
/// # Examples
///
/// ```
/// use rss_reader::util::clean_text;
///
/// assert_eq!(clean_text("  <p>Fish &amp;  chips</p>\n"), "Fish & chips");
/// assert_eq!(clean_text("a&nbsp;b"), "a b");
/// ```
pub fn clean_text(raw: &str) -> String {
    let stripped = tag_pattern().replace_all(raw, "");
    let collapsed = whitespace_pattern().replace_all(stripped.trim(), " ");
    let decoded = html_escape::decode_html_entities(&collapsed);
    truncate_chars(&decoded, MAX_TEXT_CHARS).into_owned()
}

/// Caps `s` at `max_chars` characters (not bytes, not columns).
///
/// Anything longer than `max_chars - 3` characters becomes the first
/// `max_chars - 3` characters followed by `"..."`, so a truncated result is
/// always exactly `max_chars` long. Returns `Cow::Borrowed` otherwise.
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    match s.char_indices().nth(keep) {
        Some((cut, _)) => Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS)),
        None => Cow::Borrowed(s),
    }
}

/// Returns the `src` of the first `<img …>` tag in `markup`.
///
/// Only the first `<img` tag is considered; if it has no quoted `src`
/// attribute (or an empty one) the result is `None`.
pub fn find_img_src(markup: &str) -> Option<&str> {
    let tag = img_tag_pattern().find(markup)?;
    src_pattern()
        .captures(tag.as_str())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|src| !src.is_empty())
}

/// SEC-001: Remove control characters (ESC, BEL, DEL, …) from feed-supplied
/// text before it is written to a terminal. Tabs and newlines survive.
///
/// Returns `Cow::Borrowed` when there is nothing to remove (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_unwanted = |c: char| c.is_control() && c != '\t' && c != '\n';
    if !s.chars().any(is_unwanted) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_unwanted(c)).collect())
}
