use crate::domain::entities::PhotoQueueEntry;
use crate::domain::value_objects::{PhotoId, UploadStatus};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Retry bookkeeping of a photo entry, written without touching the blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUploadState {
    pub upload_status: UploadStatus,
    pub retry_count: u32,
    pub last_attempt_at: Option<i64>,
    pub next_retry_at: Option<i64>,
}

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    async fn insert(&self, entry: &PhotoQueueEntry) -> Result<(), AppError>;

    async fn get(&self, id: &PhotoId) -> Result<Option<PhotoQueueEntry>, AppError>;

    /// Ordered by `captured_at`.
    async fn list(&self) -> Result<Vec<PhotoQueueEntry>, AppError>;

    async fn list_by_status(&self, status: UploadStatus)
    -> Result<Vec<PhotoQueueEntry>, AppError>;

    async fn update_state(&self, id: &PhotoId, state: &PhotoUploadState) -> Result<(), AppError>;

    async fn set_status(&self, id: &PhotoId, status: UploadStatus) -> Result<(), AppError>;

    /// Moves every entry in `from` back to pending with a fresh retry budget.
    async fn reset_status(&self, from: UploadStatus) -> Result<u64, AppError>;

    /// Moves `uploading` entries back to pending, keeping their retry count and schedule.
    async fn resume_interrupted(&self) -> Result<u64, AppError>;

    async fn remove(&self, id: &PhotoId) -> Result<bool, AppError>;

    async fn count_by_status(&self, status: UploadStatus) -> Result<u64, AppError>;
}
