use crate::domain::value_objects::StorageId;
use crate::infrastructure::database::ConnectionPool;
use crate::shared::clock::Clock;
use crate::shared::error::{AppError, RemoteError};
use sqlx::FromRow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Share of `max_bytes` kept after an over-limit trim.
const TRIM_TARGET_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCacheLimits {
    pub max_bytes: u64,
    pub max_age: Duration,
}

impl Default for ImageCacheLimits {
    fn default() -> Self {
        Self {
            max_bytes: 50 * 1024 * 1024,
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub storage_id: StorageId,
    pub blob: Vec<u8>,
    pub mime_type: String,
    pub cached_at: i64,
}

impl std::fmt::Debug for CachedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedImage")
            .field("storage_id", &self.storage_id)
            .field("size", &self.blob.len())
            .field("mime_type", &self.mime_type)
            .field("cached_at", &self.cached_at)
            .finish()
    }
}

#[derive(Debug, FromRow)]
struct ImageRow {
    storage_id: String,
    blob: Vec<u8>,
    mime_type: String,
    cached_at: i64,
}

#[derive(Debug, FromRow)]
struct ImageSizeRow {
    storage_id: String,
    size: i64,
    cached_at: i64,
}

/// Downloaded photos kept on disk for offline viewing, bounded by age and size.
pub struct ImageCache {
    pool: ConnectionPool,
    clock: Arc<dyn Clock>,
    limits: ImageCacheLimits,
}

impl ImageCache {
    pub fn new(pool: ConnectionPool, clock: Arc<dyn Clock>, limits: ImageCacheLimits) -> Self {
        Self {
            pool,
            clock,
            limits,
        }
    }

    fn max_age_ms(&self) -> i64 {
        i64::try_from(self.limits.max_age.as_millis()).unwrap_or(i64::MAX)
    }

    /// Expired entries are dropped on read.
    pub async fn get(&self, storage_id: &StorageId) -> Result<Option<CachedImage>, AppError> {
        let row = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT storage_id, blob, mime_type, cached_at
            FROM image_cache
            WHERE storage_id = ?1
            "#,
        )
        .bind(storage_id.as_str())
        .fetch_optional(self.pool.get_pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        if self.clock.now_ms().saturating_sub(row.cached_at) > self.max_age_ms() {
            tracing::debug!(storage_id = %storage_id, "cached image expired");
            self.remove(storage_id).await?;
            return Ok(None);
        }

        Ok(Some(CachedImage {
            storage_id: StorageId::new(row.storage_id).map_err(AppError::DeserializationError)?,
            blob: row.blob,
            mime_type: row.mime_type,
            cached_at: row.cached_at,
        }))
    }

    pub async fn put(
        &self,
        storage_id: &StorageId,
        blob: Vec<u8>,
        mime_type: &str,
    ) -> Result<CachedImage, AppError> {
        let cached_at = self.clock.now_ms();
        let size = blob.len() as i64;
        sqlx::query(
            r#"
            INSERT INTO image_cache (storage_id, blob, mime_type, cached_at, size)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(storage_id) DO UPDATE SET
                blob = excluded.blob,
                mime_type = excluded.mime_type,
                cached_at = excluded.cached_at,
                size = excluded.size
            "#,
        )
        .bind(storage_id.as_str())
        .bind(&blob)
        .bind(mime_type)
        .bind(cached_at)
        .bind(size)
        .execute(self.pool.get_pool())
        .await?;

        self.trim().await?;
        Ok(CachedImage {
            storage_id: storage_id.clone(),
            blob,
            mime_type: mime_type.to_string(),
            cached_at,
        })
    }

    /// Serves from the cache, otherwise fetches and stores the result.
    ///
    /// `fetch` yields `None` when the server no longer has the blob.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        storage_id: &StorageId,
        fetch: F,
    ) -> Result<Option<CachedImage>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<(Vec<u8>, String)>, RemoteError>>,
    {
        if let Some(hit) = self.get(storage_id).await? {
            return Ok(Some(hit));
        }
        let Some((blob, mime_type)) = fetch().await? else {
            return Ok(None);
        };
        let mime_type = if mime_type.is_empty() {
            "image/jpeg".to_string()
        } else {
            mime_type
        };
        self.put(storage_id, blob, &mime_type).await.map(Some)
    }

    pub async fn remove(&self, storage_id: &StorageId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM image_cache WHERE storage_id = ?1")
            .bind(storage_id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM image_cache")
            .execute(self.pool.get_pool())
            .await?;
        tracing::info!(removed = result.rows_affected(), "image cache cleared");
        Ok(result.rows_affected())
    }

    pub async fn total_size(&self) -> Result<u64, AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM image_cache")
            .fetch_one(self.pool.get_pool())
            .await?;
        Ok(total.max(0) as u64)
    }

    /// Drops expired entries, then the oldest ones until the cache is back
    /// under [`TRIM_TARGET_RATIO`] of its size limit.
    pub async fn trim(&self) -> Result<usize, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let entries = sqlx::query_as::<_, ImageSizeRow>(
            "SELECT storage_id, size, cached_at FROM image_cache ORDER BY cached_at ASC, storage_id ASC",
        )
        .fetch_all(&mut *tx)
        .await?;

        let now = self.clock.now_ms();
        let max_age = self.max_age_ms();
        let mut doomed = Vec::new();
        let mut live = Vec::new();
        let mut total: i64 = 0;
        for entry in entries {
            if now.saturating_sub(entry.cached_at) > max_age {
                doomed.push(entry.storage_id);
            } else {
                total += entry.size;
                live.push(entry);
            }
        }

        let max_bytes = i64::try_from(self.limits.max_bytes).unwrap_or(i64::MAX);
        if total > max_bytes {
            let target = (max_bytes as f64 * TRIM_TARGET_RATIO) as i64;
            for entry in live {
                if total <= target {
                    break;
                }
                total -= entry.size;
                doomed.push(entry.storage_id);
            }
        }

        for storage_id in &doomed {
            sqlx::query("DELETE FROM image_cache WHERE storage_id = ?1")
                .bind(storage_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        if !doomed.is_empty() {
            tracing::debug!(removed = doomed.len(), remaining_bytes = total, "image cache trimmed");
        }
        Ok(doomed.len())
    }
}
