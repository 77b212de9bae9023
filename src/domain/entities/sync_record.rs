use crate::domain::value_objects::{ClientId, SyncStatus, Table};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Entity replicated through the record store, the mutation queue and hydration.
pub trait SyncRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: Table;

    fn client_id(&self) -> &ClientId;

    fn sync_status(&self) -> SyncStatus;

    fn set_sync_status(&mut self, status: SyncStatus);

    fn last_modified(&self) -> i64;

    fn set_last_modified(&mut self, ms: i64);

    /// Partition a server snapshot is complete for (the list date for daily chores).
    fn scope(&self) -> Option<String> {
        None
    }
}

pub(crate) fn default_sync_status() -> SyncStatus {
    SyncStatus::Synced
}
