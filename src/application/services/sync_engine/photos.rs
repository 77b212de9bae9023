use super::{DrainGuard, DrainReport, SyncEngine};
use crate::application::ports::AttachPhotoArgs;
use crate::application::services::sync_bus::{DrainKind, SyncEvent};
use crate::domain::entities::PhotoQueueEntry;
use crate::domain::value_objects::{ClientId, PhotoStatus, StorageId, SyncStatus, Table};
use crate::shared::error::{AppError, RemoteError};
use std::sync::atomic::Ordering;

/// What happened to one queued photo during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoOutcome {
    Uploaded { storage_id: StorageId },
    RetryScheduled { retry_count: u32, next_retry_at: i64 },
    Failed { reason: String },
}

struct Uploaded {
    storage_id: StorageId,
    thumbnail_storage_id: Option<StorageId>,
}

impl SyncEngine {
    /// One serialized pass over pending photos whose retry time has come.
    pub async fn process_photos(&self) -> Result<DrainReport, AppError> {
        if !self.connectivity.is_online() {
            tracing::debug!("offline, photo drain skipped");
            return Ok(DrainReport::skipped());
        }
        let Some(_guard) = DrainGuard::acquire(&self.uploading) else {
            self.photo_rerun.store(true, Ordering::Release);
            return Ok(DrainReport::skipped());
        };

        let mut total = DrainReport::default();
        loop {
            self.photo_rerun.store(false, Ordering::Release);
            let pass = match self.drain_photos_once().await {
                Ok(pass) => pass,
                Err(err) => {
                    self.record_drain_error(&err).await;
                    return Err(err);
                }
            };
            total.processed += pass.processed;
            total.succeeded += pass.succeeded;
            total.failed += pass.failed;
            total.deferred = pass.deferred;

            if !self.photo_rerun.swap(false, Ordering::AcqRel) || !self.connectivity.is_online() {
                break;
            }
        }

        self.finish_drain(DrainKind::Photos, &total);
        Ok(total)
    }

    async fn drain_photos_once(&self) -> Result<DrainReport, AppError> {
        let pending = self.photos.list_pending().await?;
        let now = self.clock.now_ms();
        let mut report = DrainReport::default();

        for entry in pending {
            if !entry.is_due(now) {
                report.deferred += 1;
                continue;
            }
            report.processed += 1;
            match self.upload_photo(&entry).await {
                Ok(PhotoOutcome::Uploaded { .. }) => report.succeeded += 1,
                Ok(PhotoOutcome::RetryScheduled { .. }) => {
                    report.failed += 1;
                    report.deferred += 1;
                }
                Ok(PhotoOutcome::Failed { .. }) => report.failed += 1,
                Err(err) => {
                    tracing::error!(photo_id = %entry.id, error = %err, "failed to record photo outcome");
                    self.record_drain_error(&err).await;
                    report.failed += 1;
                }
            }
        }

        if report.processed > 0 {
            tracing::info!(
                processed = report.processed,
                succeeded = report.succeeded,
                failed = report.failed,
                deferred = report.deferred,
                "photo drain pass finished"
            );
        }
        Ok(report)
    }

    /// Uploads one photo through the three-step protocol and records the outcome.
    pub async fn upload_photo(&self, entry: &PhotoQueueEntry) -> Result<PhotoOutcome, AppError> {
        if !entry.blob_is_intact() {
            let reason = if entry.blob.is_empty() {
                "photo blob is empty".to_string()
            } else {
                "photo blob does not match its checksum".to_string()
            };
            tracing::error!(photo_id = %entry.id, daily_chore_id = %entry.daily_chore_id, %reason, "photo failed integrity check, discarding");
            self.photos.remove(&entry.id).await?;
            return self.report_photo_failure(entry, reason).await;
        }

        self.photos.mark_uploading(&entry.id).await?;
        match self.transfer(entry).await {
            Ok(uploaded) => self.on_photo_uploaded(entry, uploaded).await,
            Err(err) => {
                let transient = match &err {
                    // The chore may simply not have reached the server yet.
                    RemoteError::NotFound(_) => self.chore_pending_locally(&entry.daily_chore_id).await?,
                    other => other.is_transient(),
                };
                if !transient {
                    tracing::error!(photo_id = %entry.id, error = %err, "photo rejected");
                    return self.fail_photo(entry, err.to_string()).await;
                }

                let schedule = self.photos.increment_retry(&entry.id).await?;
                if schedule.retry_count >= self.config.photo_max_retries {
                    tracing::error!(
                        photo_id = %entry.id,
                        retry_count = schedule.retry_count,
                        error = %err,
                        "photo upload failed, retries exhausted"
                    );
                    return self
                        .fail_photo(entry, format!("gave up after {} attempts: {err}", schedule.retry_count))
                        .await;
                }

                tracing::warn!(
                    photo_id = %entry.id,
                    retry_count = schedule.retry_count,
                    next_retry_at = schedule.next_retry_at,
                    error = %err,
                    "photo upload failed, backing off"
                );
                self.bus.emit(SyncEvent::PhotoRetryScheduled {
                    photo_id: entry.id.clone(),
                    daily_chore_id: entry.daily_chore_id.clone(),
                    retry_count: schedule.retry_count,
                    next_retry_at: schedule.next_retry_at,
                });
                Ok(PhotoOutcome::RetryScheduled {
                    retry_count: schedule.retry_count,
                    next_retry_at: schedule.next_retry_at,
                })
            }
        }
    }

    async fn transfer(&self, entry: &PhotoQueueEntry) -> Result<Uploaded, RemoteError> {
        let auth = self.credentials.access_key().await;

        let target = self
            .with_timeout(self.config.rpc_timeout, self.backend.generate_upload_url(auth.clone()))
            .await?;
        let storage_id = self
            .with_timeout(
                self.config.blob_timeout,
                self.blobs
                    .upload(target, entry.blob.clone(), entry.mime_type.clone()),
            )
            .await?;

        let thumbnail_storage_id = match &entry.thumbnail {
            Some(thumbnail) => match self.upload_thumbnail(thumbnail, &entry.mime_type).await {
                Ok(id) => Some(id),
                Err(err) => {
                    tracing::warn!(photo_id = %entry.id, error = %err, "thumbnail upload failed, continuing without it");
                    None
                }
            },
            None => None,
        };

        let args = AttachPhotoArgs {
            daily_chore_client_id: entry.daily_chore_id.clone(),
            storage_id: storage_id.clone(),
            thumbnail_storage_id: thumbnail_storage_id.clone(),
            captured_at: entry.captured_at,
            captured_by: entry.captured_by.clone(),
        };
        self.with_timeout(self.config.rpc_timeout, self.backend.attach_photo(args, auth))
            .await?;

        Ok(Uploaded {
            storage_id,
            thumbnail_storage_id,
        })
    }

    async fn upload_thumbnail(&self, bytes: &[u8], mime_type: &str) -> Result<StorageId, RemoteError> {
        let auth = self.credentials.access_key().await;
        let target = self
            .with_timeout(self.config.rpc_timeout, self.backend.generate_upload_url(auth))
            .await?;
        self.with_timeout(
            self.config.blob_timeout,
            self.blobs.upload(target, bytes.to_vec(), mime_type.to_string()),
        )
        .await
    }

    async fn on_photo_uploaded(
        &self,
        entry: &PhotoQueueEntry,
        uploaded: Uploaded,
    ) -> Result<PhotoOutcome, AppError> {
        self.photos.remove(&entry.id).await?;

        let storage_id = uploaded.storage_id.clone();
        let captured_at = entry.captured_at;
        let captured_by = entry.captured_by.clone();
        self.daily_chores
            .patch_local(&entry.daily_chore_id, move |chore| {
                chore.photo_storage_id = Some(uploaded.storage_id.to_string());
                chore.thumbnail_storage_id = uploaded.thumbnail_storage_id.map(String::from);
                chore.photo_captured_at = Some(captured_at);
                chore.photo_captured_by = Some(captured_by);
                chore.photo_status = Some(PhotoStatus::Uploaded);
            })
            .await?;

        tracing::info!(
            photo_id = %entry.id,
            daily_chore_id = %entry.daily_chore_id,
            storage_id = %storage_id,
            "photo uploaded"
        );
        self.bus.emit(SyncEvent::PhotoUploaded {
            photo_id: entry.id.clone(),
            daily_chore_id: entry.daily_chore_id.clone(),
            storage_id: storage_id.to_string(),
        });
        Ok(PhotoOutcome::Uploaded { storage_id })
    }

    async fn fail_photo(
        &self,
        entry: &PhotoQueueEntry,
        reason: String,
    ) -> Result<PhotoOutcome, AppError> {
        self.photos.mark_failed(&entry.id).await?;
        self.report_photo_failure(entry, reason).await
    }

    // Clears a pending photo indicator and tells listeners the photo is gone.
    async fn report_photo_failure(
        &self,
        entry: &PhotoQueueEntry,
        reason: String,
    ) -> Result<PhotoOutcome, AppError> {
        self.daily_chores
            .patch_local(&entry.daily_chore_id, |chore| {
                if chore.photo_status == Some(PhotoStatus::Pending) {
                    chore.photo_status = None;
                }
            })
            .await?;
        self.bus.emit(SyncEvent::PhotoFailed {
            photo_id: entry.id.clone(),
            daily_chore_id: entry.daily_chore_id.clone(),
            reason: reason.clone(),
        });
        Ok(PhotoOutcome::Failed { reason })
    }

    async fn chore_pending_locally(&self, id: &ClientId) -> Result<bool, AppError> {
        if self.mutations.has_entries_for(Table::DailyChores, id).await? {
            return Ok(true);
        }
        Ok(self
            .daily_chores
            .get(id)
            .await?
            .is_some_and(|chore| chore.sync_status == SyncStatus::Pending))
    }

    /// Moves failed photos back to pending and drains them.
    pub async fn retry_failed_photos(&self) -> Result<u64, AppError> {
        let reset = self.photos.reset_failed().await?;
        self.process_photos().await?;
        Ok(reset)
    }
}
