use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use crate::normalize::NormalizedItem;

// ============================================================================
// Error Types
// ============================================================================

/// Cache database errors with user-friendly messages
#[derive(Debug, Error)]
pub enum CacheError {
    /// Another process holds the database lock beyond the busy timeout
    #[error("News cache is locked by another process. Please try again.")]
    Busy,

    /// Schema creation failed
    #[error("News cache schema could not be created: {0}")]
    Schema(String),

    /// Cache directory could not be prepared
    #[error("News cache directory is not accessible: {0}")]
    Io(#[from] std::io::Error),

    /// Generic database error
    #[error("News cache error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CacheError {
    /// Classify a sqlx error, detecting lock contention.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err.to_string()) {
            return CacheError::Busy;
        }
        CacheError::Database(err)
    }

    /// Whether repeating the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Busy)
    }
}

/// SQLITE_BUSY (5) / SQLITE_LOCKED (6) as reported through sqlx.
pub(crate) fn is_lock_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
}

// ============================================================================
// Data Structures
// ============================================================================

/// Outcome of one [`upsert`](super::CacheStore::upsert) batch.
///
/// `changed` counts inserted rows plus rows whose mutable fields were
/// overwritten; `unchanged` counts items identical to what was stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub changed: u64,
    pub unchanged: u64,
}

/// A stored news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheRecord {
    pub id: i64,
    #[serde(flatten)]
    pub item: NormalizedItem,
}

/// Internal row type for `news` queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NewsRow {
    pub id: i64,
    pub channel: String,
    pub channel_url: String,
    pub title: String,
    pub date_raw: String,
    pub date_parsed: NaiveDateTime,
    pub description: String,
    pub image: String,
    pub link: String,
}

impl NewsRow {
    pub(crate) fn into_record(self) -> CacheRecord {
        CacheRecord {
            id: self.id,
            item: NormalizedItem {
                title: self.title,
                date_raw: self.date_raw,
                date_parsed: self.date_parsed,
                description: self.description,
                image: self.image,
                link: self.link,
                channel_title: self.channel,
                channel_url: self.channel_url,
            },
        }
    }
}
