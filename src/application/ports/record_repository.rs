use crate::domain::entities::SyncRecord;
use crate::domain::value_objects::{ClientId, SyncStatus, Table};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// Entity record as held by durable storage, with the indexed fields lifted out.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub table: Table,
    pub client_id: ClientId,
    pub scope: Option<String>,
    pub sync_status: SyncStatus,
    pub last_modified: i64,
    pub data: Value,
}

impl StoredRecord {
    pub fn from_record<T: SyncRecord>(record: &T) -> Result<Self, AppError> {
        Ok(Self {
            table: T::TABLE,
            client_id: record.client_id().clone(),
            scope: record.scope(),
            sync_status: record.sync_status(),
            last_modified: record.last_modified(),
            data: serde_json::to_value(record)?,
        })
    }

    pub fn into_record<T: SyncRecord>(self) -> Result<T, AppError> {
        if self.table != T::TABLE {
            return Err(AppError::Internal(format!(
                "Record {} belongs to {}, not {}",
                self.client_id,
                self.table,
                T::TABLE
            )));
        }
        let mut record: T = serde_json::from_value(self.data)?;
        // Indexed columns are authoritative.
        record.set_sync_status(self.sync_status);
        record.set_last_modified(self.last_modified);
        Ok(record)
    }
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn get(&self, table: Table, id: &ClientId) -> Result<Option<StoredRecord>, AppError>;

    async fn put(&self, record: StoredRecord) -> Result<(), AppError>;

    async fn delete(&self, table: Table, id: &ClientId) -> Result<bool, AppError>;

    /// Upserts and deletes applied atomically.
    async fn apply_batch(
        &self,
        table: Table,
        upserts: Vec<StoredRecord>,
        deletes: Vec<ClientId>,
    ) -> Result<(), AppError>;

    async fn list(&self, table: Table, scope: Option<&str>) -> Result<Vec<StoredRecord>, AppError>;

    async fn list_by_status(
        &self,
        table: Table,
        status: SyncStatus,
    ) -> Result<Vec<StoredRecord>, AppError>;
}
