use super::SyncEngine;
use crate::domain::value_objects::{SyncStatus, UploadStatus};
use crate::shared::error::AppError;
use serde::Serialize;

/// Point-in-time view of sync progress for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusSnapshot {
    pub is_syncing: bool,
    pub is_uploading: bool,
    pub online: bool,
    pub pending_mutations: u64,
    pub failed_mutations: u64,
    pub pending_photos: u64,
    pub failed_photos: u64,
    pub failed_records: usize,
    pub last_synced_at: Option<i64>,
    pub last_error: Option<String>,
}

impl SyncStatusSnapshot {
    pub fn has_failures(&self) -> bool {
        self.failed_mutations > 0 || self.failed_photos > 0 || self.failed_records > 0
    }
}

impl SyncEngine {
    pub async fn status(&self) -> Result<SyncStatusSnapshot, AppError> {
        let total = self.mutations.count().await?;
        let failed_mutations = self.mutations.count_failed().await?;
        let pending_photos = self.photos.count_by_status(UploadStatus::Pending).await?
            + self.photos.count_by_status(UploadStatus::Uploading).await?;
        let failed_photos = self.photos.count_by_status(UploadStatus::Failed).await?;
        let failed_records = self.chores.count_by_status(SyncStatus::Failed).await?
            + self.daily_chores.count_by_status(SyncStatus::Failed).await?;
        let state = self.state.read().await;

        Ok(SyncStatusSnapshot {
            is_syncing: self.is_syncing(),
            is_uploading: self.is_uploading(),
            online: self.connectivity.is_online(),
            pending_mutations: total.saturating_sub(failed_mutations),
            failed_mutations,
            pending_photos,
            failed_photos,
            failed_records,
            last_synced_at: state.last_synced_at,
            last_error: state.last_error.clone(),
        })
    }
}
