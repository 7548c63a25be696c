use chrono::{Days, NaiveDate, NaiveTime};
use sqlx::QueryBuilder;

use super::schema::CacheStore;
use super::types::{CacheError, CacheRecord, NewsRow, UpsertCounts};
use crate::normalize::NormalizedItem;

/// Maximum number of records returned by a single query (OOM protection)
const MAX_RECORDS: i64 = 10_000;

/// SQL `LIMIT` for a caller's limit, and whether `MAX_RECORDS` replaced it
/// (no limit, or one above the cap).
fn effective_limit(limit: Option<usize>) -> (i64, bool) {
    match limit.map(i64::try_from) {
        Some(Ok(l)) if l <= MAX_RECORDS => (l, false),
        _ => (MAX_RECORDS, true),
    }
}

impl CacheStore {
    // ========================================================================
    // News Operations
    // ========================================================================

    /// Insert new items and refresh changed ones, keyed by `link`.
    ///
    /// Each item is one `INSERT ... ON CONFLICT(link) DO UPDATE ... WHERE`
    /// statement; the update only fires when title, dates, description or
    /// image differ, so `rows_affected()` tells changed (1) from unchanged (0).
    /// The channel columns of an existing row are never rewritten.
    ///
    /// The whole batch is one transaction: on error nothing is written.
    pub async fn upsert(&self, items: &[NormalizedItem]) -> Result<UpsertCounts, CacheError> {
        let mut counts = UpsertCounts::default();
        if items.is_empty() {
            return Ok(counts);
        }

        let mut tx = self.pool.begin().await.map_err(CacheError::from_sqlx)?;

        for item in items {
            let result = sqlx::query(
                r#"
                INSERT INTO news
                    (channel, channel_url, title, date_raw, date_parsed, description, image, link)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(link) DO UPDATE SET
                    title = excluded.title,
                    date_raw = excluded.date_raw,
                    date_parsed = excluded.date_parsed,
                    description = excluded.description,
                    image = excluded.image
                WHERE news.title IS NOT excluded.title
                   OR news.date_raw IS NOT excluded.date_raw
                   OR news.date_parsed IS NOT excluded.date_parsed
                   OR news.description IS NOT excluded.description
                   OR news.image IS NOT excluded.image
                "#,
            )
            .bind(&item.channel_title)
            .bind(&item.channel_url)
            .bind(&item.title)
            .bind(&item.date_raw)
            .bind(item.date_parsed)
            .bind(&item.description)
            .bind(&item.image)
            .bind(&item.link)
            .execute(&mut *tx)
            .await
            .map_err(CacheError::from_sqlx)?;

            if result.rows_affected() > 0 {
                counts.changed += 1;
            } else {
                tracing::debug!(link = %item.link, "News item unchanged");
                counts.unchanged += 1;
            }
        }

        tx.commit().await.map_err(CacheError::from_sqlx)?;
        tracing::info!(
            changed = counts.changed,
            unchanged = counts.unchanged,
            "News cache updated"
        );
        Ok(counts)
    }

    // ========================================================================
    // News Queries
    // ========================================================================

    /// Records published on the calendar day `date`, newest first.
    ///
    /// `source = None` matches every channel; `Some(url)` matches records
    /// whose `channel_url` equals `url` exactly. No match is an empty Vec.
    pub async fn query(
        &self,
        date: NaiveDate,
        source: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<CacheRecord>, CacheError> {
        let start = date.and_time(NaiveTime::MIN);
        let end = date
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(NaiveTime::MIN));

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT id, channel, channel_url, title, date_raw, date_parsed, description, image, link \
             FROM news WHERE date_parsed >= ",
        );
        builder.push_bind(start);
        if let Some(end) = end {
            builder.push(" AND date_parsed < ");
            builder.push_bind(end);
        }
        if let Some(source) = source {
            builder.push(" AND channel_url = ");
            builder.push_bind(source);
        }
        builder.push(" ORDER BY date_parsed DESC, id ASC LIMIT ");
        let (effective, capped) = effective_limit(limit);
        builder.push_bind(effective);

        let rows: Vec<NewsRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(CacheError::from_sqlx)?;

        if capped && rows.len() as i64 == MAX_RECORDS {
            tracing::warn!(
                %date,
                source,
                max = MAX_RECORDS,
                "News cache query hit the record cap; older items on this day were not returned"
            );
        }
        tracing::debug!(%date, source, found = rows.len(), "News cache queried");
        Ok(rows.into_iter().map(NewsRow::into_record).collect())
    }

    /// Delete every record and compact the file. Returns the number of
    /// records removed.
    pub async fn clean(&self) -> Result<u64, CacheError> {
        let removed = sqlx::query("DELETE FROM news")
            .execute(&self.pool)
            .await
            .map_err(CacheError::from_sqlx)?
            .rows_affected();

        // VACUUM cannot run inside a transaction
        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(CacheError::from_sqlx)?;

        tracing::info!(removed, "News cache cleaned");
        Ok(removed)
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<u64, CacheError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news")
            .fetch_one(&self.pool)
            .await
            .map_err(CacheError::from_sqlx)?;
        Ok(count.max(0) as u64)
    }
}
