use thiserror::Error;

use super::xml::{Document, Element};
use crate::util::clean_text;

/// Local tag names (prefix removed) that may carry an item image.
const MEDIA_LOCAL_NAMES: [&str; 3] = ["thumbnail", "content", "encoded"];

/// Feed-level format errors. Either one aborts the ingestion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("RSS channel was not found in XML document")]
    NoChannel,
    #[error("No news found in RSS channel")]
    NoItems,
}

/// Channel metadata for one ingestion.
///
/// `url` is the feed source exactly as the caller supplied it; it is what
/// cache queries filter on. `link` and `image` are the channel's own
/// `<link>` and `<image><url>` and only feed URL/image resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMeta {
    pub title: String,
    pub description: String,
    pub url: String,
    pub link: Option<String>,
    pub image: Option<String>,
}

/// An `<enclosure>` element's attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enclosure {
    pub url: Option<String>,
    pub mime_type: Option<String>,
}

/// A descendant of an item whose local name is thumbnail/content/encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaCandidate {
    pub url: Option<String>,
    pub text: String,
}

/// One `<item>` as found in the document, before any cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub pub_date: Option<String>,
    /// Raw description markup (HTML intact; image lookup needs the tags)
    pub description: Option<String>,
    pub link: Option<String>,
    pub enclosures: Vec<Enclosure>,
    pub media: Vec<MediaCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub channel: ChannelMeta,
    /// `<image><url>` directly under the document root, if any
    pub root_image: Option<String>,
    pub items: Vec<RawItem>,
}

/// Extracts channel metadata and up to `limit` raw items from an RSS document.
///
/// # Errors
///
/// - [`FeedError::NoChannel`] when the root has no `<channel>` child
/// - [`FeedError::NoItems`] when the channel has no `<item>` children. This
///   is checked against the full item set before `limit` is applied.
pub fn parse_channel(
    doc: &Document,
    source_url: &str,
    limit: Option<usize>,
) -> Result<ParsedFeed, FeedError> {
    let channel = doc.root.child("channel").ok_or(FeedError::NoChannel)?;

    let meta = ChannelMeta {
        title: channel.child_text("title").map(clean_text).unwrap_or_default(),
        description: channel
            .child_text("description")
            .map(clean_text)
            .unwrap_or_default(),
        url: source_url.to_string(),
        link: non_empty(channel.child_text("link")),
        image: image_url(channel),
    };
    tracing::info!(title = %meta.title, "RSS channel found");

    let available = channel.children_named("item").count();
    if available == 0 {
        return Err(FeedError::NoItems);
    }

    let take = limit.unwrap_or(usize::MAX);
    let items: Vec<RawItem> = channel
        .children_named("item")
        .take(take)
        .map(raw_item)
        .collect();

    if let Some(limit) = limit {
        if available < limit {
            tracing::warn!(limit, found = available, "Limit exceeds the number of news items in the feed");
        }
    }
    tracing::debug!(collected = items.len(), available, "Raw items extracted");

    Ok(ParsedFeed {
        channel: meta,
        root_image: image_url(&doc.root),
        items,
    })
}

fn raw_item(item: &Element) -> RawItem {
    let enclosures = item
        .children_named("enclosure")
        .map(|e| Enclosure {
            url: e.attr("url").map(str::to_string),
            mime_type: e.attr("type").map(str::to_string),
        })
        .collect();

    let media = item
        .descendants()
        .filter(|e| MEDIA_LOCAL_NAMES.contains(&e.local_name()))
        .map(|e| MediaCandidate {
            url: e.attr("url").map(str::to_string),
            text: e.text.clone(),
        })
        .collect();

    RawItem {
        title: item.child_text("title").map(str::to_string),
        pub_date: item.child_text("pubDate").map(str::to_string),
        description: item.child_text("description").map(str::to_string),
        link: item.child_text("link").map(str::to_string),
        enclosures,
        media,
    }
}

/// Text of `<image><url>` directly under `parent`.
fn image_url(parent: &Element) -> Option<String> {
    non_empty(parent.child("image").and_then(|image| image.child_text("url")))
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
