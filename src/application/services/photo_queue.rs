use super::sync_bus::{SyncBus, SyncTrigger};
use crate::application::ports::{PhotoRepository, PhotoUploadState};
use crate::domain::entities::{CapturedPhoto, PhotoQueueEntry};
use crate::domain::value_objects::{BackoffTable, ClientId, PhotoId, UploadStatus};
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    pub retry_count: u32,
    pub next_retry_at: i64,
}

/// Durable queue of captured photos. Backoff state lives on each entry so a
/// restarted process resumes the same schedule.
pub struct PhotoQueue {
    repository: Arc<dyn PhotoRepository>,
    clock: Arc<dyn Clock>,
    bus: SyncBus,
    backoff: BackoffTable,
}

impl PhotoQueue {
    pub fn new(
        repository: Arc<dyn PhotoRepository>,
        clock: Arc<dyn Clock>,
        bus: SyncBus,
        backoff: BackoffTable,
    ) -> Self {
        Self {
            repository,
            clock,
            bus,
            backoff,
        }
    }

    pub async fn enqueue(&self, photo: CapturedPhoto) -> Result<PhotoQueueEntry, AppError> {
        let entry = PhotoQueueEntry::from_capture(photo, self.clock.now_ms())
            .map_err(AppError::InvalidInput)?;
        self.repository.insert(&entry).await?;
        tracing::info!(
            photo_id = %entry.id,
            daily_chore_id = %entry.daily_chore_id,
            bytes = entry.compressed_size,
            "photo queued"
        );
        self.bus.trigger(SyncTrigger::PhotoEnqueued);
        Ok(entry)
    }

    pub async fn get(&self, id: &PhotoId) -> Result<Option<PhotoQueueEntry>, AppError> {
        self.repository.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<PhotoQueueEntry>, AppError> {
        self.repository.list().await
    }

    pub async fn list_pending(&self) -> Result<Vec<PhotoQueueEntry>, AppError> {
        self.repository.list_by_status(UploadStatus::Pending).await
    }

    pub async fn mark_uploading(&self, id: &PhotoId) -> Result<(), AppError> {
        self.repository.set_status(id, UploadStatus::Uploading).await
    }

    /// Counts a failed attempt and schedules the next one from the backoff table.
    pub async fn increment_retry(&self, id: &PhotoId) -> Result<RetrySchedule, AppError> {
        let entry = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Photo {id} not found")))?;

        let now = self.clock.now_ms();
        let retry_count = entry.retry_count.saturating_add(1);
        let wait = i64::try_from(self.backoff.backoff_for(retry_count).as_millis())
            .unwrap_or(i64::MAX);
        let next_retry_at = now.saturating_add(wait);

        self.repository
            .update_state(
                id,
                &PhotoUploadState {
                    upload_status: UploadStatus::Pending,
                    retry_count,
                    last_attempt_at: Some(now),
                    next_retry_at: Some(next_retry_at),
                },
            )
            .await?;

        Ok(RetrySchedule {
            retry_count,
            next_retry_at,
        })
    }

    /// Terminal until [`PhotoQueue::reset_failed`].
    pub async fn mark_failed(&self, id: &PhotoId) -> Result<(), AppError> {
        let entry = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Photo {id} not found")))?;

        self.repository
            .update_state(
                id,
                &PhotoUploadState {
                    upload_status: UploadStatus::Failed,
                    retry_count: entry.retry_count,
                    last_attempt_at: Some(self.clock.now_ms()),
                    next_retry_at: None,
                },
            )
            .await
    }

    pub async fn reset_failed(&self) -> Result<u64, AppError> {
        let count = self.repository.reset_status(UploadStatus::Failed).await?;
        if count > 0 {
            tracing::info!(count, "failed photos reset to pending");
        }
        Ok(count)
    }

    /// Entries left `uploading` by an interrupted process go back to pending
    /// with their retry count and schedule intact.
    pub async fn reset_interrupted(&self) -> Result<u64, AppError> {
        let count = self.repository.resume_interrupted().await?;
        if count > 0 {
            tracing::warn!(count, "recovered photos interrupted mid-upload");
        }
        Ok(count)
    }

    pub async fn remove(&self, id: &PhotoId) -> Result<bool, AppError> {
        self.repository.remove(id).await
    }

    /// Discards an entry and returns the daily chore it belonged to.
    pub async fn remove_entry(&self, id: &PhotoId) -> Result<Option<ClientId>, AppError> {
        let Some(entry) = self.repository.get(id).await? else {
            return Ok(None);
        };
        self.repository.remove(id).await?;
        Ok(Some(entry.daily_chore_id))
    }

    pub async fn count_by_status(&self, status: UploadStatus) -> Result<u64, AppError> {
        self.repository.count_by_status(status).await
    }

    pub fn backoff(&self) -> &BackoffTable {
        &self.backoff
    }
}
