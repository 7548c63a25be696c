//! Command-line RSS 2.0 reader with a local SQLite news cache.
//!
//! Ingestion: [`feed::Fetcher`] → [`feed::parse_channel`] →
//! [`normalize::normalize_feed`] → [`storage::CacheStore::upsert`].
//! Retrieval reads [`storage::CacheStore::query`] without touching the
//! network. [`pipeline`] wires both paths; [`output`] renders the result.

pub mod config;
pub mod feed;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod storage;
pub mod util;
