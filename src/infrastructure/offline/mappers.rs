use super::rows::{MutationRow, PhotoRow, RecordRow};
use crate::application::ports::StoredRecord;
use crate::domain::entities::{Mutation, MutationPayload, PhotoQueueEntry};
use crate::domain::value_objects::{
    ClientId, MutationId, MutationKind, PhotoId, SyncStatus, Table, UploadStatus,
};
use crate::shared::error::AppError;

pub fn record_from_row(row: RecordRow) -> Result<StoredRecord, AppError> {
    let table = Table::from_str(&row.table_name).ok_or_else(|| {
        AppError::DeserializationError(format!("Unknown table: {}", row.table_name))
    })?;
    let sync_status = SyncStatus::from_str(&row.sync_status).ok_or_else(|| {
        AppError::DeserializationError(format!("Unknown sync status: {}", row.sync_status))
    })?;
    Ok(StoredRecord {
        table,
        client_id: ClientId::new(row.client_id).map_err(AppError::DeserializationError)?,
        scope: row.scope,
        sync_status,
        last_modified: row.last_modified,
        data: serde_json::from_str(&row.data)?,
    })
}

pub fn mutation_from_row(row: MutationRow) -> Result<Mutation, AppError> {
    let kind = MutationKind::from_str(&row.kind)
        .ok_or_else(|| AppError::DeserializationError(format!("Unknown kind: {}", row.kind)))?;
    let table = Table::from_str(&row.table_name).ok_or_else(|| {
        AppError::DeserializationError(format!("Unknown table: {}", row.table_name))
    })?;
    let payload: MutationPayload = serde_json::from_str(&row.payload)?;
    if payload.client_id().as_str() != row.target_id {
        return Err(AppError::DeserializationError(format!(
            "Mutation {} targets {} but its payload names {}",
            row.id,
            row.target_id,
            payload.client_id()
        )));
    }
    Ok(Mutation {
        id: MutationId::new(row.id).map_err(AppError::DeserializationError)?,
        kind,
        table,
        payload,
        created_at: row.created_at,
        retry_count: u32::try_from(row.retry_count).unwrap_or(u32::MAX),
        failed_at: row.failed_at,
    })
}

pub fn photo_from_row(row: PhotoRow) -> Result<PhotoQueueEntry, AppError> {
    let upload_status = UploadStatus::from_str(&row.upload_status).ok_or_else(|| {
        AppError::DeserializationError(format!("Unknown upload status: {}", row.upload_status))
    })?;
    Ok(PhotoQueueEntry {
        id: PhotoId::new(row.id).map_err(AppError::DeserializationError)?,
        daily_chore_id: ClientId::new(row.daily_chore_id)
            .map_err(AppError::DeserializationError)?,
        blob: row.blob,
        thumbnail: row.thumbnail,
        mime_type: row.mime_type,
        original_size: u64::try_from(row.original_size).unwrap_or_default(),
        compressed_size: u64::try_from(row.compressed_size).unwrap_or_default(),
        checksum: row.checksum,
        captured_at: row.captured_at,
        captured_by: row.captured_by,
        upload_status,
        retry_count: u32::try_from(row.retry_count).unwrap_or(u32::MAX),
        last_attempt_at: row.last_attempt_at,
        next_retry_at: row.next_retry_at,
    })
}
