//! SQLite news cache.
//!
//! One table, `news`, keyed by item `link`. Ingestion upserts into it,
//! retrieval reads one calendar day at a time, `clean` empties it.

mod news;
mod schema;
mod types;

pub use schema::CacheStore;
pub use types::{CacheError, CacheRecord, UpsertCounts};
