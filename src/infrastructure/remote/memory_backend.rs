use crate::application::ports::{AttachPhotoArgs, BlobTransport, RemoteBackend};
use crate::domain::entities::{
    AddAdHocArgs, Chore, CreateChoreArgs, DailyChore, NewAdHocChore, RemoveArgs, UpdateChoreArgs,
    UpdateDailyChoreArgs,
};
use crate::domain::value_objects::{AccessKey, ClientId, PhotoStatus, StorageId, SyncStatus};
use crate::shared::error::RemoteError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

const UPLOAD_SCHEME: &str = "memory://upload/";
const BLOB_SCHEME: &str = "memory://blob/";

/// Remote operation names used for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    CreateChore,
    UpdateChore,
    RemoveChore,
    ListChores,
    CreateDailyChore,
    UpdateDailyChore,
    RemoveDailyChore,
    ListDailyChores,
    GenerateUploadUrl,
    AttachPhoto,
    PhotoUrl,
    Ping,
    UploadBlob,
    DownloadBlob,
}

#[derive(Default)]
struct State {
    chores: HashMap<ClientId, Chore>,
    daily_chores: HashMap<ClientId, DailyChore>,
    blobs: HashMap<String, (Vec<u8>, String)>,
    open_slots: Vec<String>,
    next_id: u64,
    failures: HashMap<BackendOp, VecDeque<RemoteError>>,
    calls: HashMap<BackendOp, usize>,
}

/// Process-local implementation of the remote contract, used for demo mode
/// and tests. Enforces the same rules as the real store: idempotent creates,
/// strictly-newer updates, silent no-op updates and removes for unknown ids.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    offline: AtomicBool,
    required_key: Option<AccessKey>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects calls whose access key does not match.
    pub fn with_access_key(access_key: AccessKey) -> Self {
        Self {
            required_key: Some(access_key),
            ..Self::default()
        }
    }

    /// Every call fails with a network error while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Queues `err` as the result of the next call to `op`.
    pub async fn fail_next(&self, op: BackendOp, err: RemoteError) {
        self.state
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    pub async fn calls(&self, op: BackendOp) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    pub async fn chore(&self, id: &ClientId) -> Option<Chore> {
        self.state.lock().await.chores.get(id).cloned()
    }

    pub async fn daily_chore(&self, id: &ClientId) -> Option<DailyChore> {
        self.state.lock().await.daily_chores.get(id).cloned()
    }

    pub async fn chore_count(&self) -> usize {
        self.state.lock().await.chores.len()
    }

    pub async fn blob(&self, storage_id: &StorageId) -> Option<Vec<u8>> {
        self.state
            .lock()
            .await
            .blobs
            .get(storage_id.as_str())
            .map(|(bytes, _)| bytes.clone())
    }

    /// Server-side write, as another device or the daily scheduler would make.
    pub async fn seed_chore(&self, mut chore: Chore) {
        chore.sync_status = SyncStatus::Synced;
        self.state.lock().await.chores.insert(chore.id.clone(), chore);
    }

    pub async fn seed_daily_chore(&self, mut chore: DailyChore) {
        chore.sync_status = SyncStatus::Synced;
        self.state
            .lock()
            .await
            .daily_chores
            .insert(chore.id.clone(), chore);
    }

    async fn enter(&self, op: BackendOp, auth: Option<&AccessKey>) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        *state.calls.entry(op).or_default() += 1;
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::network("in-memory backend is offline"));
        }
        if let Some(err) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        if let Some(required) = &self.required_key {
            if op != BackendOp::Ping && auth != Some(required) {
                return Err(RemoteError::Unauthorized("invalid access key".to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for InMemoryBackend {
    async fn create_chore(
        &self,
        args: CreateChoreArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.enter(BackendOp::CreateChore, auth.as_ref()).await?;
        let mut state = self.state.lock().await;
        if state.chores.contains_key(&args.client_id) {
            return Ok(());
        }
        let chore = Chore {
            id: args.client_id.clone(),
            text: args.text,
            is_completed: args.is_completed,
            completed_at: args.completed_at,
            completed_by: args.completed_by,
            sync_status: SyncStatus::Synced,
            last_modified: args.last_modified,
        };
        state.chores.insert(args.client_id, chore);
        Ok(())
    }

    async fn update_chore(
        &self,
        args: UpdateChoreArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.enter(BackendOp::UpdateChore, auth.as_ref()).await?;
        let mut state = self.state.lock().await;
        let Some(chore) = state.chores.get_mut(&args.client_id) else {
            return Ok(());
        };
        if args.last_modified <= chore.last_modified {
            return Ok(());
        }
        if let Some(text) = args.text {
            chore.text = text;
        }
        match args.is_completed {
            Some(true) => {
                chore.is_completed = true;
                chore.completed_at = args.completed_at.or(chore.completed_at);
                chore.completed_by = args.completed_by.or(chore.completed_by.take());
            }
            Some(false) => {
                chore.is_completed = false;
                chore.completed_at = None;
                chore.completed_by = None;
            }
            None => {}
        }
        chore.last_modified = args.last_modified;
        Ok(())
    }

    async fn remove_chore(
        &self,
        args: RemoveArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.enter(BackendOp::RemoveChore, auth.as_ref()).await?;
        self.state.lock().await.chores.remove(&args.client_id);
        Ok(())
    }

    async fn list_chores(&self, auth: Option<AccessKey>) -> Result<Vec<Chore>, RemoteError> {
        self.enter(BackendOp::ListChores, auth.as_ref()).await?;
        let state = self.state.lock().await;
        let mut chores: Vec<Chore> = state.chores.values().cloned().collect();
        chores.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(chores)
    }

    async fn list_chores_since(
        &self,
        since: i64,
        auth: Option<AccessKey>,
    ) -> Result<Vec<Chore>, RemoteError> {
        self.enter(BackendOp::ListChores, auth.as_ref()).await?;
        let state = self.state.lock().await;
        let mut chores: Vec<Chore> = state
            .chores
            .values()
            .filter(|c| c.last_modified > since)
            .cloned()
            .collect();
        chores.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(chores)
    }

    async fn create_daily_chore(
        &self,
        args: AddAdHocArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.enter(BackendOp::CreateDailyChore, auth.as_ref()).await?;
        let mut state = self.state.lock().await;
        if state.daily_chores.contains_key(&args.client_id) {
            return Ok(());
        }
        let sort_order = state
            .daily_chores
            .values()
            .filter(|c| c.date == args.date && c.time_slot == args.time_slot)
            .map(|c| c.sort_order)
            .max()
            .unwrap_or(0)
            + 1;
        let input = NewAdHocChore {
            text: args.text,
            time_slot: args.time_slot,
            animal_category: args.animal_category,
            created_by: args.created_by,
        };
        let mut chore = DailyChore::ad_hoc(
            args.client_id.clone(),
            args.date,
            &input,
            sort_order,
            args.last_modified,
        )
        .map_err(RemoteError::Rejected)?;
        chore.sync_status = SyncStatus::Synced;
        state.daily_chores.insert(args.client_id, chore);
        Ok(())
    }

    async fn update_daily_chore(
        &self,
        args: UpdateDailyChoreArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.enter(BackendOp::UpdateDailyChore, auth.as_ref()).await?;
        let mut state = self.state.lock().await;
        let Some(chore) = state.daily_chores.get_mut(&args.client_id) else {
            return Ok(());
        };
        if args.last_modified <= chore.last_modified {
            return Ok(());
        }
        chore.is_completed = args.is_completed;
        if args.is_completed {
            chore.completed_at = args.completed_at;
            chore.completed_by = args.completed_by;
        } else {
            chore.completed_at = None;
            chore.completed_by = None;
        }
        chore.last_modified = args.last_modified;
        Ok(())
    }

    async fn remove_daily_chore(
        &self,
        args: RemoveArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.enter(BackendOp::RemoveDailyChore, auth.as_ref()).await?;
        self.state
            .lock()
            .await
            .daily_chores
            .remove(&args.client_id);
        Ok(())
    }

    async fn list_daily_chores_by_date(
        &self,
        date: String,
        auth: Option<AccessKey>,
    ) -> Result<Vec<DailyChore>, RemoteError> {
        self.enter(BackendOp::ListDailyChores, auth.as_ref()).await?;
        let state = self.state.lock().await;
        let mut chores: Vec<DailyChore> = state
            .daily_chores
            .values()
            .filter(|c| c.date == date)
            .cloned()
            .collect();
        chores.sort_by(|a, b| (a.time_slot, a.sort_order).cmp(&(b.time_slot, b.sort_order)));
        Ok(chores)
    }

    async fn generate_upload_url(&self, auth: Option<AccessKey>) -> Result<String, RemoteError> {
        self.enter(BackendOp::GenerateUploadUrl, auth.as_ref()).await?;
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let url = format!("{UPLOAD_SCHEME}{}", state.next_id);
        state.open_slots.push(url.clone());
        Ok(url)
    }

    async fn attach_photo(
        &self,
        args: AttachPhotoArgs,
        auth: Option<AccessKey>,
    ) -> Result<(), RemoteError> {
        self.enter(BackendOp::AttachPhoto, auth.as_ref()).await?;
        let mut state = self.state.lock().await;
        if !state.daily_chores.contains_key(&args.daily_chore_client_id) {
            return Err(RemoteError::NotFound(format!(
                "Daily chore not found: {}",
                args.daily_chore_client_id
            )));
        }
        let empty = match state.blobs.get(args.storage_id.as_str()) {
            None => {
                return Err(RemoteError::Rejected(format!(
                    "Unknown storage id {}",
                    args.storage_id
                )));
            }
            Some((bytes, _)) => bytes.is_empty(),
        };
        if empty {
            state.blobs.remove(args.storage_id.as_str());
            return Err(RemoteError::Rejected(format!(
                "Photo {} is empty",
                args.storage_id
            )));
        }

        let Some(chore) = state.daily_chores.get_mut(&args.daily_chore_client_id) else {
            return Ok(());
        };
        chore.photo_storage_id = Some(args.storage_id.to_string());
        chore.thumbnail_storage_id = args.thumbnail_storage_id.map(String::from);
        chore.photo_captured_at = Some(args.captured_at);
        chore.photo_captured_by = Some(args.captured_by);
        chore.photo_status = Some(PhotoStatus::Uploaded);
        chore.last_modified += 1;
        Ok(())
    }

    async fn photo_url(
        &self,
        storage_id: StorageId,
        auth: Option<AccessKey>,
    ) -> Result<Option<String>, RemoteError> {
        self.enter(BackendOp::PhotoUrl, auth.as_ref()).await?;
        let state = self.state.lock().await;
        Ok(state
            .blobs
            .contains_key(storage_id.as_str())
            .then(|| format!("{BLOB_SCHEME}{storage_id}")))
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        self.enter(BackendOp::Ping, None).await
    }
}

#[async_trait]
impl BlobTransport for InMemoryBackend {
    async fn upload(
        &self,
        target: String,
        bytes: Vec<u8>,
        mime_type: String,
    ) -> Result<StorageId, RemoteError> {
        self.enter(BackendOp::UploadBlob, self.required_key.as_ref())
            .await?;
        let mut state = self.state.lock().await;
        let Some(slot) = state.open_slots.iter().position(|s| *s == target) else {
            return Err(RemoteError::Rejected(format!(
                "Upload target {target} is not valid"
            )));
        };
        state.open_slots.swap_remove(slot);
        state.next_id += 1;
        let storage_id = format!("kg{}", state.next_id);
        state.blobs.insert(storage_id.clone(), (bytes, mime_type));
        StorageId::new(storage_id).map_err(RemoteError::Rejected)
    }

    async fn download(&self, url: String) -> Result<(Vec<u8>, String), RemoteError> {
        self.enter(BackendOp::DownloadBlob, self.required_key.as_ref())
            .await?;
        let state = self.state.lock().await;
        url.strip_prefix(BLOB_SCHEME)
            .and_then(|id| state.blobs.get(id))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("No blob at {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::daily_chore::fixtures::daily_chore;

    fn id(value: &str) -> ClientId {
        ClientId::new(value.to_string()).unwrap()
    }

    fn create(client_id: &str, text: &str, last_modified: i64) -> CreateChoreArgs {
        CreateChoreArgs {
            client_id: id(client_id),
            text: text.into(),
            is_completed: false,
            completed_at: None,
            completed_by: None,
            last_modified,
        }
    }

    fn update_text(client_id: &str, text: &str, last_modified: i64) -> UpdateChoreArgs {
        UpdateChoreArgs {
            client_id: id(client_id),
            text: Some(text.into()),
            is_completed: None,
            completed_at: None,
            completed_by: None,
            last_modified,
        }
    }

    #[tokio::test]
    async fn create_is_idempotent_by_client_id() {
        let backend = InMemoryBackend::new();
        backend.create_chore(create("a", "first", 1), None).await.unwrap();
        backend.create_chore(create("a", "second", 2), None).await.unwrap();

        assert_eq!(backend.chore_count().await, 1);
        assert_eq!(backend.chore(&id("a")).await.unwrap().text, "first");
    }

    #[tokio::test]
    async fn updates_apply_only_when_strictly_newer() {
        let backend = InMemoryBackend::new();
        backend.create_chore(create("a", "v1", 100), None).await.unwrap();

        backend.update_chore(update_text("a", "stale", 100), None).await.unwrap();
        assert_eq!(backend.chore(&id("a")).await.unwrap().text, "v1");

        backend.update_chore(update_text("a", "v2", 101), None).await.unwrap();
        let chore = backend.chore(&id("a")).await.unwrap();
        assert_eq!(chore.text, "v2");
        assert_eq!(chore.last_modified, 101);

        // Unknown ids are a silent no-op.
        backend.update_chore(update_text("zzz", "x", 500), None).await.unwrap();
        assert_eq!(backend.chore_count().await, 1);
    }

    #[tokio::test]
    async fn removes_are_idempotent() {
        let backend = InMemoryBackend::new();
        backend.create_chore(create("a", "v1", 1), None).await.unwrap();
        let remove = RemoveArgs { client_id: id("a") };
        backend.remove_chore(remove.clone(), None).await.unwrap();
        backend.remove_chore(remove, None).await.unwrap();
        assert_eq!(backend.chore_count().await, 0);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let backend = InMemoryBackend::new();
        backend
            .fail_next(BackendOp::CreateChore, RemoteError::api(503, "busy"))
            .await;

        let first = backend.create_chore(create("a", "v1", 1), None).await;
        assert_eq!(first, Err(RemoteError::api(503, "busy")));
        backend.create_chore(create("a", "v1", 1), None).await.unwrap();
        assert_eq!(backend.calls(BackendOp::CreateChore).await, 2);

        backend.set_offline(true);
        assert!(matches!(backend.ping().await, Err(RemoteError::Network(_))));
    }

    #[tokio::test]
    async fn access_key_is_enforced() {
        let key = AccessKey::new("farm-key".into()).unwrap();
        let backend = InMemoryBackend::with_access_key(key.clone());

        let denied = backend.list_chores(None).await;
        assert!(matches!(denied, Err(RemoteError::Unauthorized(_))));
        assert!(backend.list_chores(Some(key)).await.unwrap().is_empty());
        backend.ping().await.unwrap();
    }

    #[tokio::test]
    async fn photo_protocol_attaches_uploaded_blob() {
        let backend = InMemoryBackend::new();
        backend.seed_daily_chore(daily_chore("d-1", "2025-06-01", 10)).await;

        let target = backend.generate_upload_url(None).await.unwrap();
        let storage_id = backend
            .upload(target.clone(), vec![1, 2, 3], "image/jpeg".into())
            .await
            .unwrap();
        // Upload targets are single use.
        assert!(backend.upload(target, vec![1], "image/jpeg".into()).await.is_err());

        backend
            .attach_photo(
                AttachPhotoArgs {
                    daily_chore_client_id: id("d-1"),
                    storage_id: storage_id.clone(),
                    thumbnail_storage_id: None,
                    captured_at: 42,
                    captured_by: "Ana".into(),
                },
                None,
            )
            .await
            .unwrap();

        let chore = backend.daily_chore(&id("d-1")).await.unwrap();
        assert_eq!(chore.photo_storage_id.as_deref(), Some(storage_id.as_str()));
        assert_eq!(chore.photo_status, Some(PhotoStatus::Uploaded));
        assert_eq!(chore.last_modified, 11);

        let url = backend.photo_url(storage_id, None).await.unwrap().unwrap();
        let (bytes, mime) = backend.download(url).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(mime, "image/jpeg");
    }

    #[tokio::test]
    async fn zero_byte_attach_is_rejected_and_cleaned_up() {
        let backend = InMemoryBackend::new();
        backend.seed_daily_chore(daily_chore("d-1", "2025-06-01", 10)).await;
        let target = backend.generate_upload_url(None).await.unwrap();
        let storage_id = backend
            .upload(target, Vec::new(), "image/jpeg".into())
            .await
            .unwrap();

        let args = AttachPhotoArgs {
            daily_chore_client_id: id("d-1"),
            storage_id: storage_id.clone(),
            thumbnail_storage_id: None,
            captured_at: 42,
            captured_by: "Ana".into(),
        };
        let result = backend.attach_photo(args, None).await;

        assert!(matches!(result, Err(RemoteError::Rejected(_))));
        assert!(backend.blob(&storage_id).await.is_none());
        assert!(!backend.daily_chore(&id("d-1")).await.unwrap().has_photo());
    }

    #[tokio::test]
    async fn attach_to_missing_chore_is_not_found() {
        let backend = InMemoryBackend::new();
        let target = backend.generate_upload_url(None).await.unwrap();
        let storage_id = backend.upload(target, vec![9], "image/jpeg".into()).await.unwrap();

        let result = backend
            .attach_photo(
                AttachPhotoArgs {
                    daily_chore_client_id: id("ghost"),
                    storage_id,
                    thumbnail_storage_id: None,
                    captured_at: 1,
                    captured_by: "Ana".into(),
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(RemoteError::NotFound(_))));
    }
}
