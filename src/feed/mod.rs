//! Feed retrieval and RSS structure extraction.
//!
//! - **Fetching**: URL validation, HTTP retrieval with retry and size limits
//! - **XML**: a strict element tree over `quick-xml`
//! - **Parsing**: channel metadata and raw `<item>` fields, untouched by any
//!   cleanup (that is [`crate::normalize`]'s job)
//!
//! # Example
//!
//! ```ignore
//! use rss_reader::feed::{parse_channel, Fetcher};
//!
//! let fetcher = Fetcher::new(&config)?;
//! let doc = fetcher.fetch("https://example.com/rss").await?;
//! let feed = parse_channel(&doc, "https://example.com/rss", Some(5))?;
//! ```

mod fetcher;
mod parser;
mod xml;

pub use fetcher::{FetchError, Fetcher};
pub use parser::{
    parse_channel, ChannelMeta, Enclosure, FeedError, MediaCandidate, ParsedFeed, RawItem,
};
pub use xml::{Document, Element, XmlError};
