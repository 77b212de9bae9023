use super::mappers::photo_from_row;
use super::rows::PhotoRow;
use crate::application::ports::{PhotoRepository, PhotoUploadState};
use crate::domain::entities::PhotoQueueEntry;
use crate::domain::value_objects::{PhotoId, UploadStatus};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;

const SELECT_PHOTO: &str = r#"
    SELECT id, daily_chore_id, blob, thumbnail, mime_type, original_size, compressed_size,
           checksum, captured_at, captured_by, upload_status, retry_count, last_attempt_at,
           next_retry_at
    FROM photo_queue
"#;

#[derive(Clone)]
pub struct SqlitePhotoRepository {
    pool: ConnectionPool,
}

impl SqlitePhotoRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &SqlitePool {
        self.pool.get_pool()
    }
}

#[async_trait]
impl PhotoRepository for SqlitePhotoRepository {
    async fn insert(&self, entry: &PhotoQueueEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO photo_queue (
                id, daily_chore_id, blob, thumbnail, mime_type, original_size, compressed_size,
                checksum, captured_at, captured_by, upload_status, retry_count, last_attempt_at,
                next_retry_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(entry.id.as_str())
        .bind(entry.daily_chore_id.as_str())
        .bind(entry.blob.as_slice())
        .bind(entry.thumbnail.as_deref())
        .bind(&entry.mime_type)
        .bind(i64::try_from(entry.original_size).unwrap_or(i64::MAX))
        .bind(i64::try_from(entry.compressed_size).unwrap_or(i64::MAX))
        .bind(&entry.checksum)
        .bind(entry.captured_at)
        .bind(&entry.captured_by)
        .bind(entry.upload_status.as_str())
        .bind(i64::from(entry.retry_count))
        .bind(entry.last_attempt_at)
        .bind(entry.next_retry_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get(&self, id: &PhotoId) -> Result<Option<PhotoQueueEntry>, AppError> {
        let row = sqlx::query_as::<_, PhotoRow>(&format!("{SELECT_PHOTO} WHERE id = ?1"))
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;

        row.map(photo_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<PhotoQueueEntry>, AppError> {
        let rows = sqlx::query_as::<_, PhotoRow>(&format!(
            "{SELECT_PHOTO} ORDER BY captured_at ASC, id ASC"
        ))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(photo_from_row).collect()
    }

    async fn list_by_status(
        &self,
        status: UploadStatus,
    ) -> Result<Vec<PhotoQueueEntry>, AppError> {
        let rows = sqlx::query_as::<_, PhotoRow>(&format!(
            "{SELECT_PHOTO} WHERE upload_status = ?1 ORDER BY captured_at ASC, id ASC"
        ))
        .bind(status.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(photo_from_row).collect()
    }

    async fn update_state(&self, id: &PhotoId, state: &PhotoUploadState) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE photo_queue
            SET upload_status = ?2, retry_count = ?3, last_attempt_at = ?4, next_retry_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .bind(state.upload_status.as_str())
        .bind(i64::from(state.retry_count))
        .bind(state.last_attempt_at)
        .bind(state.next_retry_at)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Photo {id} not found")));
        }
        Ok(())
    }

    async fn set_status(&self, id: &PhotoId, status: UploadStatus) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE photo_queue SET upload_status = ?2 WHERE id = ?1")
            .bind(id.as_str())
            .bind(status.as_str())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Photo {id} not found")));
        }
        Ok(())
    }

    async fn reset_status(&self, from: UploadStatus) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE photo_queue
            SET upload_status = 'pending', retry_count = 0, next_retry_at = NULL
            WHERE upload_status = ?1
            "#,
        )
        .bind(from.as_str())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn resume_interrupted(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE photo_queue SET upload_status = 'pending' WHERE upload_status = 'uploading'",
        )
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn remove(&self, id: &PhotoId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM photo_queue WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_status(&self, status: UploadStatus) -> Result<u64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM photo_queue WHERE upload_status = ?1")
                .bind(status.as_str())
                .fetch_one(self.pool())
                .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CapturedPhoto;
    use crate::domain::value_objects::ClientId;

    async fn repository() -> SqlitePhotoRepository {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        SqlitePhotoRepository::new(pool)
    }

    fn entry(chore: &str, captured_at: i64) -> PhotoQueueEntry {
        PhotoQueueEntry::from_capture(
            CapturedPhoto {
                daily_chore_id: ClientId::new(chore.into()).unwrap(),
                blob: vec![0xFF, 0xD8, 0xFF, 0xE0],
                thumbnail: Some(vec![1, 2]),
                mime_type: "image/jpeg".into(),
                original_size: 10,
                captured_by: "Ana".into(),
            },
            captured_at,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn blobs_survive_a_round_trip() {
        let repo = repository().await;
        let photo = entry("d-1", 5);
        repo.insert(&photo).await.unwrap();

        let stored = repo.get(&photo.id).await.unwrap().unwrap();
        assert_eq!(stored.blob, photo.blob);
        assert_eq!(stored.thumbnail, photo.thumbnail);
        assert!(stored.blob_is_intact());
    }

    #[tokio::test]
    async fn pending_entries_are_listed_by_capture_time() {
        let repo = repository().await;
        let later = entry("d-2", 20);
        let earlier = entry("d-1", 10);
        repo.insert(&later).await.unwrap();
        repo.insert(&earlier).await.unwrap();
        repo.set_status(&later.id, UploadStatus::Failed).await.unwrap();

        let pending = repo.list_by_status(UploadStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, earlier.id);
        assert_eq!(repo.list().await.unwrap()[0].id, earlier.id);
    }

    #[tokio::test]
    async fn reset_status_restores_retry_budget() {
        let repo = repository().await;
        let photo = entry("d-1", 1);
        repo.insert(&photo).await.unwrap();
        repo.update_state(
            &photo.id,
            &PhotoUploadState {
                upload_status: UploadStatus::Failed,
                retry_count: 5,
                last_attempt_at: Some(100),
                next_retry_at: Some(400),
            },
        )
        .await
        .unwrap();

        assert_eq!(repo.reset_status(UploadStatus::Failed).await.unwrap(), 1);
        let stored = repo.get(&photo.id).await.unwrap().unwrap();
        assert_eq!(stored.upload_status, UploadStatus::Pending);
        assert_eq!(stored.retry_count, 0);
        assert_eq!(stored.next_retry_at, None);
        assert_eq!(stored.last_attempt_at, Some(100));
    }

    #[tokio::test]
    async fn interrupted_uploads_keep_their_retry_state() {
        let repo = repository().await;
        let photo = entry("d-1", 1);
        repo.insert(&photo).await.unwrap();
        repo.update_state(
            &photo.id,
            &PhotoUploadState {
                upload_status: UploadStatus::Uploading,
                retry_count: 3,
                last_attempt_at: Some(100),
                next_retry_at: Some(45_100),
            },
        )
        .await
        .unwrap();

        assert_eq!(repo.resume_interrupted().await.unwrap(), 1);
        let stored = repo.get(&photo.id).await.unwrap().unwrap();
        assert_eq!(stored.upload_status, UploadStatus::Pending);
        assert_eq!(stored.retry_count, 3);
        assert_eq!(stored.next_retry_at, Some(45_100));
        assert_eq!(repo.resume_interrupted().await.unwrap(), 0);
    }
}
