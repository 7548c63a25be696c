//! Item image resolution.
//!
//! Resolvers are tried in a fixed order and the first one that yields a
//! non-empty URL wins; when none does, [`FALLBACK_IMAGE`] is used.

use crate::feed::{ChannelMeta, RawItem};
use crate::util::find_img_src;

/// Generic RSS logo used when neither the item nor the feed names an image.
pub const FALLBACK_IMAGE: &str = "https://www.rssboard.org/images/rss-man-graphic.png";

/// Everything an image resolver may look at.
pub struct ImageSources<'a> {
    pub item: &'a RawItem,
    pub channel: &'a ChannelMeta,
    pub root_image: Option<&'a str>,
}

pub type ImageResolver = fn(&ImageSources<'_>) -> Option<String>;

pub const IMAGE_RESOLVERS: [(&str, ImageResolver); 5] = [
    ("enclosure", from_enclosure),
    ("description", from_description),
    ("media", from_media),
    ("channel", from_channel),
    ("root", from_root),
];

/// Picks the item's image URL. The result may still be root-relative;
/// the caller resolves it against the channel link.
pub fn resolve_image(sources: &ImageSources<'_>) -> String {
    IMAGE_RESOLVERS
        .iter()
        .find_map(|(name, resolve)| {
            let url = resolve(sources)?;
            tracing::trace!(source = *name, url = %url, "Image resolved");
            Some(url)
        })
        .unwrap_or_else(|| FALLBACK_IMAGE.to_string())
}

/// An enclosure typed as an image, or one with no type at all.
fn from_enclosure(sources: &ImageSources<'_>) -> Option<String> {
    sources
        .item
        .enclosures
        .iter()
        .filter(|e| {
            e.mime_type
                .as_deref()
                .map_or(true, |t| t.is_empty() || t.contains("image"))
        })
        .find_map(|e| non_empty(e.url.as_deref()))
}

/// First `<img src>` in the unstripped description markup.
fn from_description(sources: &ImageSources<'_>) -> Option<String> {
    let markup = sources.item.description.as_deref()?;
    non_empty(find_img_src(markup))
}

/// `media:thumbnail`, `media:content`, `content:encoded` and friends:
/// a `url` attribute, else an `<img src>` in their text.
fn from_media(sources: &ImageSources<'_>) -> Option<String> {
    sources.item.media.iter().find_map(|m| {
        non_empty(m.url.as_deref()).or_else(|| non_empty(find_img_src(&m.text)))
    })
}

fn from_channel(sources: &ImageSources<'_>) -> Option<String> {
    non_empty(sources.channel.image.as_deref())
}

fn from_root(sources: &ImageSources<'_>) -> Option<String> {
    non_empty(sources.root_image)
}

fn non_empty(url: Option<&str>) -> Option<String> {
    url.map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Enclosure, MediaCandidate};
    use pretty_assertions::assert_eq;

    fn enclosure(url: &str, mime_type: Option<&str>) -> Enclosure {
        Enclosure {
            url: Some(url.to_string()),
            mime_type: mime_type.map(str::to_string),
        }
    }

    fn resolve(item: &RawItem, channel: &ChannelMeta, root_image: Option<&str>) -> String {
        resolve_image(&ImageSources {
            item,
            channel,
            root_image,
        })
    }

    fn rich_item() -> RawItem {
        RawItem {
            description: Some(r#"<img src="https://d/desc.png">"#.into()),
            media: vec![MediaCandidate {
                url: Some("https://m/media.png".into()),
                text: String::new(),
            }],
            ..RawItem::default()
        }
    }

    fn rich_channel() -> ChannelMeta {
        ChannelMeta {
            image: Some("https://c/channel.png".into()),
            ..ChannelMeta::default()
        }
    }

    #[test]
    fn test_image_enclosure_overrides_everything() {
        let mut item = rich_item();
        item.enclosures = vec![enclosure("https://e/photo.jpg", Some("image/jpeg"))];
        assert_eq!(
            resolve(&item, &rich_channel(), Some("https://r/root.png")),
            "https://e/photo.jpg"
        );
    }

    #[test]
    fn test_untyped_enclosure_counts_as_image() {
        let mut item = rich_item();
        item.enclosures = vec![enclosure("https://e/untyped", None)];
        assert_eq!(resolve(&item, &rich_channel(), None), "https://e/untyped");

        item.enclosures = vec![enclosure("https://e/empty-type", Some(""))];
        assert_eq!(resolve(&item, &rich_channel(), None), "https://e/empty-type");
    }

    #[test]
    fn test_non_image_enclosure_skipped() {
        let mut item = rich_item();
        item.enclosures = vec![
            enclosure("https://e/podcast.mp3", Some("audio/mpeg")),
            enclosure("https://e/second.png", Some("image/png")),
        ];
        assert_eq!(resolve(&item, &rich_channel(), None), "https://e/second.png");

        item.enclosures = vec![enclosure("https://e/podcast.mp3", Some("audio/mpeg"))];
        assert_eq!(resolve(&item, &rich_channel(), None), "https://d/desc.png");
    }

    #[test]
    fn test_description_before_media() {
        assert_eq!(
            resolve(&rich_item(), &rich_channel(), None),
            "https://d/desc.png"
        );
    }

    #[test]
    fn test_media_url_then_media_text() {
        let mut item = rich_item();
        item.description = Some("plain text".into());
        assert_eq!(resolve(&item, &rich_channel(), None), "https://m/media.png");

        item.media = vec![
            MediaCandidate {
                url: None,
                text: "no image here".into(),
            },
            MediaCandidate {
                url: None,
                text: r#"<p><img src="https://m/encoded.png"></p>"#.into(),
            },
        ];
        assert_eq!(resolve(&item, &rich_channel(), None), "https://m/encoded.png");
    }

    #[test]
    fn test_channel_then_root_then_fallback() {
        let item = RawItem::default();
        assert_eq!(
            resolve(&item, &rich_channel(), Some("https://r/root.png")),
            "https://c/channel.png"
        );
        assert_eq!(
            resolve(&item, &ChannelMeta::default(), Some("https://r/root.png")),
            "https://r/root.png"
        );
        assert_eq!(resolve(&item, &ChannelMeta::default(), None), FALLBACK_IMAGE);
    }
}
