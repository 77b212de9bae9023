use super::mutation_queue::MutationQueue;
use super::record_store::RecordStore;
use crate::domain::entities::{Chore, CreateChoreArgs, MutationPayload, RemoveArgs, UpdateChoreArgs};
use crate::domain::value_objects::{ClientId, MutationKind, SyncStatus, Table};
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoreCounts {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub failed: usize,
}

/// Optimistic edits of the shared chore list: each change is persisted
/// locally first, then queued for the server.
pub struct ChoreService {
    store: Arc<RecordStore<Chore>>,
    mutations: Arc<MutationQueue>,
    clock: Arc<dyn Clock>,
}

impl ChoreService {
    pub fn new(
        store: Arc<RecordStore<Chore>>,
        mutations: Arc<MutationQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            mutations,
            clock,
        }
    }

    /// Newest first.
    pub async fn load(&self) -> Result<Vec<Chore>, AppError> {
        let mut chores = self.store.load(None).await?;
        chores.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(chores)
    }

    pub async fn add(&self, text: &str) -> Result<Chore, AppError> {
        let chore = Chore::new(ClientId::generate(), text.to_string(), self.clock.now_ms())
            .map_err(AppError::InvalidInput)?;
        let chore = self.store.put_optimistic(chore).await?;
        self.mutations
            .enqueue(
                MutationKind::Create,
                Table::Chores,
                MutationPayload::CreateChore(CreateChoreArgs::from(&chore)),
            )
            .await?;
        Ok(chore)
    }

    /// Flips completion; `Ok(None)` when the chore is not known locally.
    pub async fn toggle_complete(
        &self,
        id: &ClientId,
        completed_by: Option<String>,
    ) -> Result<Option<Chore>, AppError> {
        let Some(mut chore) = self.store.get(id).await? else {
            return Ok(None);
        };
        chore.set_completed(!chore.is_completed, completed_by, self.clock.now_utc());
        let chore = self.store.put_optimistic(chore).await?;

        let args = UpdateChoreArgs {
            client_id: chore.id.clone(),
            text: None,
            is_completed: Some(chore.is_completed),
            completed_at: chore.completed_at,
            completed_by: chore.completed_by.clone(),
            last_modified: chore.last_modified,
        };
        self.mutations
            .enqueue(
                MutationKind::Update,
                Table::Chores,
                MutationPayload::UpdateChore(args),
            )
            .await?;
        Ok(Some(chore))
    }

    pub async fn update_text(&self, id: &ClientId, text: &str) -> Result<Option<Chore>, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidInput(
                "Chore text cannot be empty".to_string(),
            ));
        }
        let Some(mut chore) = self.store.get(id).await? else {
            return Ok(None);
        };
        chore.text = text.to_string();
        let chore = self.store.put_optimistic(chore).await?;

        let args = UpdateChoreArgs {
            client_id: chore.id.clone(),
            text: Some(chore.text.clone()),
            is_completed: None,
            completed_at: None,
            completed_by: None,
            last_modified: chore.last_modified,
        };
        self.mutations
            .enqueue(
                MutationKind::Update,
                Table::Chores,
                MutationPayload::UpdateChore(args),
            )
            .await?;
        Ok(Some(chore))
    }

    pub async fn remove(&self, id: &ClientId) -> Result<bool, AppError> {
        if self.store.get(id).await?.is_none() {
            return Ok(false);
        }
        // Queued before the local delete so a concurrent hydration already
        // treats the id as a pending delete.
        self.mutations
            .enqueue(
                MutationKind::Delete,
                Table::Chores,
                MutationPayload::RemoveChore(RemoveArgs {
                    client_id: id.clone(),
                }),
            )
            .await?;
        self.store.remove(id).await?;
        Ok(true)
    }

    pub async fn get(&self, id: &ClientId) -> Result<Option<Chore>, AppError> {
        self.store.get(id).await
    }

    pub async fn counts(&self) -> ChoreCounts {
        let items = self.store.items().await;
        ChoreCounts {
            total: items.len(),
            completed: items.iter().filter(|c| c.is_completed).count(),
            pending: items
                .iter()
                .filter(|c| c.sync_status == SyncStatus::Pending)
                .count(),
            failed: items
                .iter()
                .filter(|c| c.sync_status == SyncStatus::Failed)
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::sync_bus::{SyncBus, SyncTrigger};
    use crate::infrastructure::database::ConnectionPool;
    use crate::infrastructure::offline::{SqliteMutationRepository, SqliteRecordRepository};
    use crate::shared::clock::ManualClock;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        service: ChoreService,
        mutations: Arc<MutationQueue>,
        clock: Arc<ManualClock>,
        triggers: UnboundedReceiver<SyncTrigger>,
    }

    async fn fixture() -> Fixture {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let clock = Arc::new(ManualClock::new(10_000));
        let (bus, triggers) = SyncBus::new();
        let store = Arc::new(RecordStore::new(
            Arc::new(SqliteRecordRepository::new(pool.clone())),
            clock.clone(),
            bus.clone(),
        ));
        let mutations = Arc::new(MutationQueue::new(
            Arc::new(SqliteMutationRepository::new(pool)),
            clock.clone(),
            bus,
        ));
        Fixture {
            service: ChoreService::new(store, mutations.clone(), clock.clone()),
            mutations,
            clock,
            triggers,
        }
    }

    #[tokio::test]
    async fn add_persists_pending_and_queues_create() {
        let mut f = fixture().await;

        let chore = f.service.add("  Collect eggs ").await.unwrap();

        assert_eq!(chore.text, "Collect eggs");
        assert_eq!(chore.sync_status, SyncStatus::Pending);
        assert_eq!(chore.last_modified, 10_000);
        let queued = f.mutations.list().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].kind, MutationKind::Create);
        assert_eq!(queued[0].target_id(), &chore.id);
        assert_eq!(f.triggers.try_recv().unwrap(), SyncTrigger::Enqueued);
    }

    #[tokio::test]
    async fn add_rejects_blank_text_without_queueing() {
        let f = fixture().await;
        assert!(matches!(
            f.service.add("   ").await,
            Err(AppError::InvalidInput(_))
        ));
        assert_eq!(f.mutations.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn toggle_records_attribution_and_clears_it_again() {
        let f = fixture().await;
        let chore = f.service.add("Water horses").await.unwrap();

        f.clock.advance(1_000);
        let done = f
            .service
            .toggle_complete(&chore.id, Some("Ana".into()))
            .await
            .unwrap()
            .unwrap();
        assert!(done.is_completed);
        assert_eq!(done.completed_by.as_deref(), Some("Ana"));
        assert!(done.completed_at.is_some());
        assert_eq!(done.last_modified, 11_000);

        let undone = f
            .service
            .toggle_complete(&chore.id, Some("Ana".into()))
            .await
            .unwrap()
            .unwrap();
        assert!(!undone.is_completed);
        assert!(undone.completed_by.is_none());
        assert!(undone.last_modified > done.last_modified);

        let queued = f.mutations.list().await.unwrap();
        assert_eq!(queued.len(), 3);
        match &queued[2].payload {
            MutationPayload::UpdateChore(args) => {
                assert_eq!(args.is_completed, Some(false));
                assert!(args.text.is_none());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored() {
        let f = fixture().await;
        let missing = ClientId::new("nope".into()).unwrap();
        assert!(f.service.toggle_complete(&missing, None).await.unwrap().is_none());
        assert!(f.service.update_text(&missing, "x").await.unwrap().is_none());
        assert!(!f.service.remove(&missing).await.unwrap());
        assert_eq!(f.mutations.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_deletes_locally_and_queues_delete() {
        let f = fixture().await;
        let chore = f.service.add("Fix fence").await.unwrap();

        assert!(f.service.remove(&chore.id).await.unwrap());

        assert!(f.service.get(&chore.id).await.unwrap().is_none());
        let deletes = f.mutations.pending_deletes(Table::Chores).await.unwrap();
        assert!(deletes.contains(&chore.id));
        assert_eq!(f.service.counts().await.total, 0);
    }

    #[tokio::test]
    async fn counts_follow_local_state() {
        let f = fixture().await;
        let a = f.service.add("Feed pigs").await.unwrap();
        f.service.add("Feed goats").await.unwrap();
        f.service.toggle_complete(&a.id, None).await.unwrap();

        let counts = f.service.counts().await;
        assert_eq!(
            counts,
            ChoreCounts {
                total: 2,
                completed: 1,
                pending: 2,
                failed: 0,
            }
        );
    }
}
