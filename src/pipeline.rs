//! The two end-to-end paths: ingestion (network → cache) and retrieval
//! (cache only).

use chrono::NaiveDate;
use thiserror::Error;

use crate::feed::{parse_channel, ChannelMeta, FeedError, FetchError, Fetcher};
use crate::normalize::{normalize_feed, NormalizeWarning, NormalizedItem};
use crate::storage::{CacheError, CacheRecord, CacheStore, UpsertCounts};

/// Every error that aborts a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl PipelineError {
    /// Whether the same run may succeed later without any change of input.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Cache(e) => e.is_retryable(),
            PipelineError::Fetch(
                FetchError::Network(_)
                | FetchError::Timeout(_)
                | FetchError::RateLimited(_)
                | FetchError::IncompleteResponse { .. },
            ) => true,
            PipelineError::Fetch(FetchError::HttpStatus { code, .. }) => *code >= 500,
            _ => false,
        }
    }
}

/// Result of one successful ingestion.
#[derive(Debug, Clone)]
pub struct Ingestion {
    pub channel: ChannelMeta,
    /// Normalized items in feed order
    pub items: Vec<NormalizedItem>,
    pub warnings: Vec<NormalizeWarning>,
    pub counts: UpsertCounts,
}

/// Result of one cache lookup.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub date: NaiveDate,
    pub source: Option<String>,
    /// Newest first
    pub records: Vec<CacheRecord>,
}

/// Fetch `source`, extract up to `limit` items, normalize them and upsert
/// them into `store`.
///
/// Nothing is written unless every step before the upsert succeeded; a
/// channel without items is [`FeedError::NoItems`].
pub async fn ingest(
    fetcher: &Fetcher,
    store: &CacheStore,
    source: &str,
    limit: Option<usize>,
) -> Result<Ingestion, PipelineError> {
    let doc = fetcher.fetch(source).await?;
    let feed = parse_channel(&doc, source, limit)?;
    let normalized = normalize_feed(&feed);
    let counts = store.upsert(&normalized.items).await?;

    tracing::info!(
        source,
        items = normalized.items.len(),
        warnings = normalized.warnings.len(),
        "Feed ingested"
    );

    Ok(Ingestion {
        channel: feed.channel,
        items: normalized.items,
        warnings: normalized.warnings,
        counts,
    })
}

/// Read records for `date` (optionally one source) from `store`. No network.
pub async fn load_cached(
    store: &CacheStore,
    date: NaiveDate,
    source: Option<&str>,
    limit: Option<usize>,
) -> Result<Retrieval, PipelineError> {
    let records = store.query(date, source, limit).await?;

    if let Some(limit) = limit {
        if !records.is_empty() && records.len() < limit {
            tracing::warn!(limit, found = records.len(), "Limit exceeds the number of cached news items");
        }
    }
    tracing::info!(%date, found = records.len(), "News retrieved from cache");

    Ok(Retrieval {
        date,
        source: source.map(str::to_string),
        records,
    })
}
