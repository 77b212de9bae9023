use super::sync_bus::{SyncBus, SyncTrigger};
use crate::application::ports::MutationRepository;
use crate::domain::entities::{Mutation, MutationPayload};
use crate::domain::value_objects::{ClientId, MutationId, MutationKind, Table};
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use std::collections::HashSet;
use std::sync::Arc;

/// Durable FIFO log of remote writes. Entries leave only on confirmed success,
/// a terminal rejection, or an explicit clear.
pub struct MutationQueue {
    repository: Arc<dyn MutationRepository>,
    clock: Arc<dyn Clock>,
    bus: SyncBus,
}

impl MutationQueue {
    pub fn new(repository: Arc<dyn MutationRepository>, clock: Arc<dyn Clock>, bus: SyncBus) -> Self {
        Self {
            repository,
            clock,
            bus,
        }
    }

    /// Records the intent durably, then wakes the engine without waiting for it.
    pub async fn enqueue(
        &self,
        kind: MutationKind,
        table: Table,
        payload: MutationPayload,
    ) -> Result<MutationId, AppError> {
        let mutation = Mutation::new(kind, table, payload, self.clock.now_ms())
            .map_err(AppError::ValidationError)?;
        self.repository.insert(&mutation).await?;
        tracing::debug!(
            mutation_id = %mutation.id,
            kind = kind.as_str(),
            table = table.as_str(),
            target = %mutation.target_id(),
            "mutation queued"
        );
        self.bus.trigger(SyncTrigger::Enqueued);
        Ok(mutation.id)
    }

    pub async fn list(&self) -> Result<Vec<Mutation>, AppError> {
        self.repository.list().await
    }

    pub async fn remove(&self, id: &MutationId) -> Result<bool, AppError> {
        self.repository.remove(id).await
    }

    pub async fn increment_retry(&self, id: &MutationId) -> Result<u32, AppError> {
        self.repository.increment_retry(id).await
    }

    /// Keeps the entry for inspection and manual retry; drains skip it.
    pub async fn mark_failed(&self, id: &MutationId) -> Result<(), AppError> {
        self.repository.mark_failed(id, self.clock.now_ms()).await
    }

    pub async fn reset_failed(&self) -> Result<u64, AppError> {
        self.repository.reset_failed().await
    }

    pub async fn count(&self) -> Result<u64, AppError> {
        self.repository.count().await
    }

    pub async fn count_failed(&self) -> Result<u64, AppError> {
        self.repository.count_failed().await
    }

    /// Entities of `table` whose remote delete is still queued.
    pub async fn pending_deletes(&self, table: Table) -> Result<HashSet<ClientId>, AppError> {
        Ok(self
            .repository
            .targets(table, MutationKind::Delete)
            .await?
            .into_iter()
            .collect())
    }

    pub async fn has_entries_for(&self, table: Table, id: &ClientId) -> Result<bool, AppError> {
        self.repository.has_entries_for(table, id).await
    }

    pub async fn clear(&self) -> Result<u64, AppError> {
        self.repository.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{RemoveArgs, UpdateChoreArgs};
    use crate::infrastructure::database::ConnectionPool;
    use crate::infrastructure::offline::SqliteMutationRepository;
    use crate::shared::clock::ManualClock;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn queue() -> (MutationQueue, UnboundedReceiver<SyncTrigger>) {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let (bus, rx) = SyncBus::new();
        let queue = MutationQueue::new(
            Arc::new(SqliteMutationRepository::new(pool)),
            Arc::new(ManualClock::new(1_000)),
            bus,
        );
        (queue, rx)
    }

    fn remove_chore(id: &str) -> MutationPayload {
        MutationPayload::RemoveChore(RemoveArgs {
            client_id: ClientId::new(id.into()).unwrap(),
        })
    }

    #[tokio::test]
    async fn enqueue_persists_and_signals_engine() {
        let (queue, mut rx) = queue().await;
        let id = queue
            .enqueue(MutationKind::Delete, Table::Chores, remove_chore("a"))
            .await
            .unwrap();

        assert_eq!(queue.count().await.unwrap(), 1);
        assert_eq!(queue.list().await.unwrap()[0].id, id);
        assert_eq!(rx.try_recv().unwrap(), SyncTrigger::Enqueued);
    }

    #[tokio::test]
    async fn mismatched_payload_is_rejected_before_storage() {
        let (queue, mut rx) = queue().await;
        let payload = MutationPayload::UpdateChore(UpdateChoreArgs {
            client_id: ClientId::new("a".into()).unwrap(),
            text: Some("x".into()),
            is_completed: None,
            completed_at: None,
            completed_by: None,
            last_modified: 1,
        });

        let result = queue
            .enqueue(MutationKind::Delete, Table::Chores, payload)
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(queue.count().await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pending_deletes_come_from_queued_entries() {
        let (queue, _rx) = queue().await;
        queue
            .enqueue(MutationKind::Delete, Table::Chores, remove_chore("gone"))
            .await
            .unwrap();

        let deletes = queue.pending_deletes(Table::Chores).await.unwrap();
        assert!(deletes.contains(&ClientId::new("gone".into()).unwrap()));
        assert!(queue
            .pending_deletes(Table::DailyChores)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn failed_entries_stay_until_reset() {
        let (queue, _rx) = queue().await;
        let id = queue
            .enqueue(MutationKind::Delete, Table::Chores, remove_chore("a"))
            .await
            .unwrap();
        queue.increment_retry(&id).await.unwrap();
        queue.mark_failed(&id).await.unwrap();

        assert_eq!(queue.count().await.unwrap(), 1);
        assert_eq!(queue.count_failed().await.unwrap(), 1);
        assert_eq!(queue.reset_failed().await.unwrap(), 1);
        assert_eq!(queue.count_failed().await.unwrap(), 0);
    }
}
