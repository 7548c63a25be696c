//! Plain-text and JSON presentation of ingested or cached news.
//!
//! Text fields come from remote feeds, so control characters are removed
//! before anything reaches the terminal.

use serde::Serialize;

use crate::normalize::NormalizedItem;
use crate::pipeline::{Ingestion, Retrieval};
use crate::storage::CacheRecord;
use crate::util::strip_control_chars;

// ============================================================================
// Text
// ============================================================================

/// Channel header followed by one block per item.
pub fn feed_text(ingestion: &Ingestion) -> String {
    let mut out = String::from("\n");
    push_field(&mut out, "Feed", &ingestion.channel.title);
    push_field(&mut out, "Description", &ingestion.channel.description);
    push_field(&mut out, "URL", &ingestion.channel.url);
    out.push('\n');

    for item in &ingestion.items {
        push_item(&mut out, item, false);
    }
    trim_last_newline(out)
}

/// "RSS news for <day>" header followed by one block per record. Without a
/// source filter every block also names its channel.
pub fn cached_text(retrieval: &Retrieval) -> String {
    let day = human_date(retrieval);
    let mut out = String::from("\n");
    match &retrieval.source {
        None => out.push_str(&format!("RSS news for {day} from all channels\n")),
        Some(source) => {
            let channel = retrieval
                .records
                .first()
                .map_or(source.as_str(), |r| r.item.channel_title.as_str());
            out.push_str(&format!(
                "RSS news for {day} from channel '{}'\n",
                strip_control_chars(channel)
            ));
        }
    }
    out.push('\n');

    let with_channel = retrieval.source.is_none();
    for record in &retrieval.records {
        push_item(&mut out, &record.item, with_channel);
    }
    trim_last_newline(out)
}

/// `October 12, 2021`
pub fn human_date(retrieval: &Retrieval) -> String {
    retrieval.date.format("%B %d, %Y").to_string()
}

fn push_item(out: &mut String, item: &NormalizedItem, with_channel: bool) {
    push_field(out, "Title", &item.title);
    if with_channel {
        push_field(out, "Channel", &item.channel_title);
        push_field(out, "Channel URL", &item.channel_url);
    }
    push_field(out, "Date", &item.date_raw);
    push_field(out, "Image", &item.image);
    push_field(out, "Detail", &item.description);
    push_field(out, "Read more", &item.link);
    out.push('\n');
}

fn push_field(out: &mut String, label: &str, value: &str) {
    if !value.is_empty() {
        out.push_str(&format!("{label}: {}\n", strip_control_chars(value)));
    }
}

fn trim_last_newline(mut out: String) -> String {
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

// ============================================================================
// JSON
// ============================================================================

#[derive(Serialize)]
struct ChannelView<'a> {
    title: &'a str,
    description: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct FeedView<'a> {
    channel: ChannelView<'a>,
    items: &'a [NormalizedItem],
}

#[derive(Serialize)]
struct CachedView<'a> {
    date: String,
    source: Option<&'a str>,
    items: &'a [CacheRecord],
}

/// `{"channel": {...}, "items": [...]}`, pretty-printed.
pub fn feed_json(ingestion: &Ingestion) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&FeedView {
        channel: ChannelView {
            title: &ingestion.channel.title,
            description: &ingestion.channel.description,
            url: &ingestion.channel.url,
        },
        items: &ingestion.items,
    })
}

/// `{"date": "2021-10-12", "source": ..., "items": [...]}`, pretty-printed.
pub fn cached_json(retrieval: &Retrieval) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&CachedView {
        date: retrieval.date.format("%Y-%m-%d").to_string(),
        source: retrieval.source.as_deref(),
        items: &retrieval.records,
    })
}
