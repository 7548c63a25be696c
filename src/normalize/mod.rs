//! Conversion of raw feed items into canonical news records.
//!
//! - **Text**: markup stripped, whitespace collapsed, entities decoded,
//!   capped at 1000 characters (see [`crate::util::clean_text`])
//! - **Links and images**: root-relative URLs resolved against the channel link
//! - **Dates**: ordered parse strategies with a sentinel fallback
//!   ([`dates`])
//!
//! Missing fields never fail: they become empty strings. The only signal of
//! a problem is a [`NormalizeWarning`] for a date no strategy could read.

mod dates;
mod images;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::feed::{ChannelMeta, ParsedFeed, RawItem};
use crate::util::clean_text;

pub use dates::{parse_pub_date, sentinel, DateStrategy, DATE_STRATEGIES};
pub use images::{resolve_image, ImageResolver, ImageSources, FALLBACK_IMAGE, IMAGE_RESOLVERS};

/// One news item in canonical form. Every string is present (possibly empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedItem {
    pub title: String,
    /// `<pubDate>` after text cleanup, as published
    pub date_raw: String,
    /// Parsed `date_raw`, or [`sentinel()`] when unparseable
    pub date_parsed: NaiveDateTime,
    pub description: String,
    pub image: String,
    pub link: String,
    pub channel_title: String,
    pub channel_url: String,
}

/// A condition absorbed during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeWarning {
    UnparseableDate { title: String, raw: String },
}

impl fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeWarning::UnparseableDate { title, .. } => write!(
                f,
                "No date provided or wrong date format in news '{title}'. Date set to '19000101'."
            ),
        }
    }
}

/// Output of [`normalize_feed`]: items in feed order plus absorbed warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub items: Vec<NormalizedItem>,
    pub warnings: Vec<NormalizeWarning>,
}

/// Normalizes every raw item of `feed`.
pub fn normalize_feed(feed: &ParsedFeed) -> Normalized {
    let mut normalized = Normalized::default();
    for (n, raw) in feed.items.iter().enumerate() {
        let item = normalize_item(
            raw,
            &feed.channel,
            feed.root_image.as_deref(),
            &mut normalized.warnings,
        );
        tracing::debug!(n = n + 1, title = %item.title, link = %item.link, "News item normalized");
        normalized.items.push(item);
    }
    normalized
}

/// Normalizes one item. An unparseable date pushes a warning onto `warnings`.
pub fn normalize_item(
    raw: &RawItem,
    channel: &ChannelMeta,
    root_image: Option<&str>,
    warnings: &mut Vec<NormalizeWarning>,
) -> NormalizedItem {
    let title = clean_field(raw.title.as_deref());
    let date_raw = clean_field(raw.pub_date.as_deref());
    let link = resolve_relative(&clean_field(raw.link.as_deref()), channel.link.as_deref());

    let image = resolve_image(&ImageSources {
        item: raw,
        channel,
        root_image,
    });
    let image = resolve_relative(&image, channel.link.as_deref());

    let date_parsed = match parse_pub_date(&date_raw) {
        Some(parsed) => parsed,
        None => {
            let warning = NormalizeWarning::UnparseableDate {
                title: title.clone(),
                raw: date_raw.clone(),
            };
            tracing::warn!(title = %title, raw = %date_raw, "{warning}");
            warnings.push(warning);
            sentinel()
        }
    };

    NormalizedItem {
        title,
        date_raw,
        date_parsed,
        description: clean_field(raw.description.as_deref()),
        image,
        link,
        channel_title: channel.title.clone(),
        channel_url: channel.url.clone(),
    }
}

/// Prefixes a root-relative `url` (`/a/b`) with the channel link, minus one
/// trailing slash. Without a channel link the URL is returned unchanged.
pub fn resolve_relative(url: &str, channel_link: Option<&str>) -> String {
    match channel_link {
        Some(site) if url.starts_with('/') => {
            format!("{}{}", site.strip_suffix('/').unwrap_or(site), url)
        }
        _ => url.to_string(),
    }
}

fn clean_field(raw: Option<&str>) -> String {
    raw.map(clean_text).unwrap_or_default()
}
