use crate::domain::entities::{
    AddAdHocArgs, Chore, CreateChoreArgs, DailyChore, RemoveArgs, UpdateChoreArgs,
    UpdateDailyChoreArgs,
};
use crate::domain::value_objects::{AccessKey, ClientId, StorageId};
use crate::shared::error::RemoteError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Arguments of the attach step of the photo upload protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachPhotoArgs {
    pub daily_chore_client_id: ClientId,
    pub storage_id: StorageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_storage_id: Option<StorageId>,
    pub captured_at: i64,
    pub captured_by: String,
}

/// Transactional RPC surface of the central store.
///
/// Creates are idempotent by client id, updates are no-ops for unknown ids and
/// only apply when strictly newer, removes of unknown ids succeed silently.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn create_chore(
        &self,
        args: CreateChoreArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError>;

    async fn update_chore(
        &self,
        args: UpdateChoreArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError>;

    async fn remove_chore(&self, args: RemoveArgs, auth: Option<AccessKey>)
    -> Result<(), RemoteError>;

    async fn list_chores(&self, auth: Option<AccessKey>) -> Result<Vec<Chore>, RemoteError>;

    async fn list_chores_since(
        &self,
        since: i64,
        auth: Option<AccessKey>,
    ) -> Result<Vec<Chore>, RemoteError>;

    async fn create_daily_chore(
        &self,
        args: AddAdHocArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError>;

    async fn update_daily_chore(
        &self,
        args: UpdateDailyChoreArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError>;

    async fn remove_daily_chore(
        &self,
        args: RemoveArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError>;

    async fn list_daily_chores_by_date(
        &self,
        date: String,
        auth: Option<AccessKey>,
    ) -> Result<Vec<DailyChore>, RemoteError>;

    /// Short-lived write target for one blob.
    async fn generate_upload_url(&self, auth: Option<AccessKey>) -> Result<String, RemoteError>;

    /// Fails with `NotFound` when the daily chore does not exist remotely and
    /// `Rejected` when the referenced blob is empty.
    async fn attach_photo(
        &self,
        args: AttachPhotoArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError>;

    async fn photo_url(
        &self,
        storage_id: StorageId,
        auth: Option<AccessKey>,
    ) -> Result<Option<String>, RemoteError>;

    async fn ping(&self) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait BlobTransport: Send + Sync {
    async fn upload(
        &self,
        target: String,
        bytes: Vec<u8>,
        mime_type: String,
    ) -> Result<StorageId, RemoteError>;

    /// Returns the body and its content type.
    async fn download(&self, url: String) -> Result<(Vec<u8>, String), RemoteError>;
}
