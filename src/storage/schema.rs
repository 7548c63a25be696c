use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_error, CacheError};

const IN_MEMORY: &str = ":memory:";

// ============================================================================
// CacheStore
// ============================================================================

/// Handle to the SQLite news cache.
#[derive(Clone)]
pub struct CacheStore {
    pub(crate) pool: SqlitePool,
}

impl CacheStore {
    /// Open (creating if needed) the cache at `path`; `":memory:"` gives a
    /// private in-memory store.
    ///
    /// The schema is created when the backing file did not exist before this
    /// call, or when an existing file lacks the `news` table.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Busy` if another process keeps the database locked
    /// past the 5 second busy timeout, `CacheError::Schema` if tables cannot be
    /// created, `CacheError::Database` for other database errors.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let in_memory = path == Path::new(IN_MEMORY);
        let fresh = in_memory || !path.exists();

        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(CacheError::from_sqlx)?
        } else {
            prepare_file(path)?;
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release
        // before returning SQLITE_BUSY.
        let options = options.pragma("busy_timeout", "5000");

        // A private in-memory database only lives as long as its connection.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(CacheError::from_sqlx)?;
        let store = Self { pool };

        if fresh {
            tracing::info!(path = %path.display(), "Creating news cache");
            store.ensure_schema().await?;
        } else if !store.has_schema().await? {
            tracing::warn!(path = %path.display(), "News cache has no schema, creating it");
            store.ensure_schema().await?;
        } else {
            tracing::debug!(path = %path.display(), "Opened existing news cache");
        }
        Ok(store)
    }

    /// Create the `news` table and its index. Idempotent.
    ///
    /// Both statements run in one transaction, so a failure leaves the file
    /// as it was.
    pub async fn ensure_schema(&self) -> Result<(), CacheError> {
        self.create_tables().await.map_err(|e| {
            if is_lock_error(&e.to_string()) {
                CacheError::Busy
            } else {
                CacheError::Schema(e.to_string())
            }
        })
    }

    async fn create_tables(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel TEXT NOT NULL,
                channel_url TEXT NOT NULL,
                title TEXT NOT NULL,
                date_raw TEXT NOT NULL,
                date_parsed TEXT NOT NULL,
                description TEXT NOT NULL,
                image TEXT NOT NULL,
                link TEXT NOT NULL UNIQUE
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Day queries are range scans on date_parsed
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_news_date_parsed ON news(date_parsed DESC)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn has_schema(&self) -> Result<bool, CacheError> {
        let found: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'news'")
                .fetch_optional(&self.pool)
                .await
                .map_err(CacheError::from_sqlx)?;
        Ok(found.is_some())
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Create the parent directory and, on Unix, pre-create the file with 0600.
fn prepare_file(path: &Path) -> Result<(), CacheError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    // SEC-010: Set database file permissions before pool creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        if path.exists() {
            let perms = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path, perms) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to set cache file permissions");
            }
        } else {
            // If creation fails, SQLite reports the error at connect time.
            let _file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(path)
                .ok();
        }
    }
    Ok(())
}
