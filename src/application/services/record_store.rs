use super::merge::{SnapshotKind, merge_snapshot};
use super::sync_bus::{SyncBus, SyncEvent};
use crate::application::ports::{RecordRepository, StoredRecord};
use crate::domain::entities::SyncRecord;
use crate::domain::value_objects::{ClientId, SyncStatus};
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrationReport {
    pub upserted: usize,
    pub removed: usize,
}

/// Optimistic local store for one entity table: durable rows plus an in-memory
/// projection of everything loaded so far.
pub struct RecordStore<T: SyncRecord> {
    repository: Arc<dyn RecordRepository>,
    clock: Arc<dyn Clock>,
    bus: SyncBus,
    projection: RwLock<HashMap<ClientId, T>>,
    // Serializes read-modify-write cycles so timestamps stay monotonic per id.
    write_gate: Mutex<()>,
    _record: PhantomData<T>,
}

impl<T: SyncRecord> RecordStore<T> {
    pub fn new(repository: Arc<dyn RecordRepository>, clock: Arc<dyn Clock>, bus: SyncBus) -> Self {
        Self {
            repository,
            clock,
            bus,
            projection: RwLock::new(HashMap::new()),
            write_gate: Mutex::new(()),
            _record: PhantomData,
        }
    }

    /// Reads the durable rows of `scope` (all rows for `None`) into the projection.
    pub async fn load(&self, scope: Option<&str>) -> Result<Vec<T>, AppError> {
        let rows = self.repository.list(T::TABLE, scope).await?;
        let records = rows
            .into_iter()
            .map(StoredRecord::into_record::<T>)
            .collect::<Result<Vec<T>, AppError>>()?;

        let mut projection = self.projection.write().await;
        projection.retain(|_, r| scope.is_some() && r.scope().as_deref() != scope);
        for record in &records {
            projection.insert(record.client_id().clone(), record.clone());
        }
        Ok(records)
    }

    pub async fn items(&self) -> Vec<T> {
        let mut items: Vec<T> = self.projection.read().await.values().cloned().collect();
        items.sort_by(|a, b| a.client_id().cmp(b.client_id()));
        items
    }

    pub async fn items_in(&self, scope: &str) -> Vec<T> {
        let mut items: Vec<T> = self
            .projection
            .read()
            .await
            .values()
            .filter(|r| r.scope().as_deref() == Some(scope))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.client_id().cmp(b.client_id()));
        items
    }

    pub async fn get(&self, id: &ClientId) -> Result<Option<T>, AppError> {
        if let Some(record) = self.projection.read().await.get(id) {
            return Ok(Some(record.clone()));
        }
        self.fetch_durable(id).await
    }

    /// Persists a local edit as `pending`, stamped strictly after any previous write.
    pub async fn put_optimistic(&self, mut record: T) -> Result<T, AppError> {
        let _gate = self.write_gate.lock().await;
        let previous = self.fetch_durable(record.client_id()).await?;
        let floor = previous.map(|p| p.last_modified() + 1).unwrap_or(i64::MIN);
        let stamp = self.clock.now_ms().max(floor).max(record.last_modified());

        record.set_last_modified(stamp);
        record.set_sync_status(SyncStatus::Pending);
        self.write(&record).await?;
        self.bus.emit(SyncEvent::RecordChanged {
            table: T::TABLE,
            client_id: record.client_id().clone(),
        });
        Ok(record)
    }

    /// Applies a local-only change that is not itself replicated; status and
    /// timestamp are left as they are.
    pub async fn patch_local<F>(&self, id: &ClientId, apply: F) -> Result<Option<T>, AppError>
    where
        F: FnOnce(&mut T) + Send,
    {
        let _gate = self.write_gate.lock().await;
        let Some(mut record) = self.fetch_durable(id).await? else {
            return Ok(None);
        };
        let status = record.sync_status();
        let stamp = record.last_modified();
        apply(&mut record);
        record.set_sync_status(status);
        record.set_last_modified(stamp);

        self.write(&record).await?;
        self.bus.emit(SyncEvent::RecordChanged {
            table: T::TABLE,
            client_id: id.clone(),
        });
        Ok(Some(record))
    }

    pub async fn remove(&self, id: &ClientId) -> Result<Option<T>, AppError> {
        let _gate = self.write_gate.lock().await;
        let existing = self.fetch_durable(id).await?;
        self.repository.delete(T::TABLE, id).await?;
        self.projection.write().await.remove(id);
        if existing.is_some() {
            self.bus.emit(SyncEvent::RecordRemoved {
                table: T::TABLE,
                client_id: id.clone(),
            });
        }
        Ok(existing)
    }

    /// Marks a record synced after a confirmed remote write carrying the local
    /// state as of `through`. A newer local edit keeps the record pending.
    pub async fn mark_synced(&self, id: &ClientId, through: Option<i64>) -> Result<bool, AppError> {
        let _gate = self.write_gate.lock().await;
        let Some(mut record) = self.fetch_durable(id).await? else {
            return Ok(false);
        };
        if let Some(through) = through {
            if record.last_modified() > through {
                tracing::debug!(
                    table = T::TABLE.as_str(),
                    id = %id,
                    "newer local edit pending, not marking synced"
                );
                return Ok(false);
            }
        }
        if record.sync_status() != SyncStatus::Synced {
            record.set_sync_status(SyncStatus::Synced);
            self.write(&record).await?;
        }
        self.bus.emit(SyncEvent::RecordSynced {
            table: T::TABLE,
            client_id: id.clone(),
        });
        Ok(true)
    }

    pub async fn mark_failed(&self, id: &ClientId, reason: &str) -> Result<bool, AppError> {
        let _gate = self.write_gate.lock().await;
        let Some(mut record) = self.fetch_durable(id).await? else {
            return Ok(false);
        };
        if record.sync_status() != SyncStatus::Failed {
            record.set_sync_status(SyncStatus::Failed);
            self.write(&record).await?;
        }
        self.bus.emit(SyncEvent::RecordFailed {
            table: T::TABLE,
            client_id: id.clone(),
            reason: reason.to_string(),
        });
        Ok(true)
    }

    pub async fn reset_failed_to_pending(&self) -> Result<usize, AppError> {
        let _gate = self.write_gate.lock().await;
        let failed = self
            .repository
            .list_by_status(T::TABLE, SyncStatus::Failed)
            .await?;
        let mut count = 0;
        for row in failed {
            let mut record: T = row.into_record()?;
            record.set_sync_status(SyncStatus::Pending);
            self.write(&record).await?;
            count += 1;
        }
        Ok(count)
    }

    pub async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<T>, AppError> {
        self.repository
            .list_by_status(T::TABLE, status)
            .await?
            .into_iter()
            .map(StoredRecord::into_record::<T>)
            .collect()
    }

    pub async fn count_by_status(&self, status: SyncStatus) -> Result<usize, AppError> {
        Ok(self.repository.list_by_status(T::TABLE, status).await?.len())
    }

    /// Folds a server snapshot for `scope` into local state, writing only real changes.
    ///
    /// `pending_deletes` is loaded while the write gate is held, so a local
    /// delete that lands during the fetch is always seen by the merge.
    pub async fn hydrate<F, Fut>(
        &self,
        server: Vec<T>,
        scope: Option<&str>,
        pending_deletes: F,
        kind: SnapshotKind,
    ) -> Result<HydrationReport, AppError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<HashSet<ClientId>, AppError>> + Send,
    {
        let _gate = self.write_gate.lock().await;
        let pending_deletes = pending_deletes().await?;
        let local = self
            .repository
            .list(T::TABLE, scope)
            .await?
            .into_iter()
            .map(StoredRecord::into_record::<T>)
            .collect::<Result<Vec<T>, AppError>>()?;

        let server = match scope {
            Some(scope) => server
                .into_iter()
                .filter(|r| r.scope().as_deref() == Some(scope))
                .collect(),
            None => server,
        };

        let outcome = merge_snapshot(&local, server, &pending_deletes, kind);
        if outcome.is_empty() {
            return Ok(HydrationReport::default());
        }

        let rows = outcome
            .upserts
            .iter()
            .map(StoredRecord::from_record)
            .collect::<Result<Vec<_>, AppError>>()?;
        self.repository
            .apply_batch(T::TABLE, rows, outcome.removed.clone())
            .await?;

        let mut projection = self.projection.write().await;
        for record in &outcome.upserts {
            projection.insert(record.client_id().clone(), record.clone());
            self.bus.emit(SyncEvent::RecordChanged {
                table: T::TABLE,
                client_id: record.client_id().clone(),
            });
        }
        for id in &outcome.removed {
            projection.remove(id);
            self.bus.emit(SyncEvent::RecordRemoved {
                table: T::TABLE,
                client_id: id.clone(),
            });
        }

        let report = HydrationReport {
            upserted: outcome.upserts.len(),
            removed: outcome.removed.len(),
        };
        tracing::info!(
            table = T::TABLE.as_str(),
            scope = scope.unwrap_or("*"),
            upserted = report.upserted,
            removed = report.removed,
            "hydrated server snapshot"
        );
        Ok(report)
    }

    async fn fetch_durable(&self, id: &ClientId) -> Result<Option<T>, AppError> {
        self.repository
            .get(T::TABLE, id)
            .await?
            .map(StoredRecord::into_record::<T>)
            .transpose()
    }

    // Durable first, then the projection.
    async fn write(&self, record: &T) -> Result<(), AppError> {
        self.repository.put(StoredRecord::from_record(record)?).await?;
        self.projection
            .write()
            .await
            .insert(record.client_id().clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Chore;
    use crate::domain::value_objects::Table;
    use crate::infrastructure::database::ConnectionPool;
    use crate::infrastructure::offline::SqliteRecordRepository;
    use crate::shared::clock::ManualClock;

    async fn store(clock: Arc<ManualClock>) -> RecordStore<Chore> {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let (bus, _rx) = SyncBus::new();
        RecordStore::new(Arc::new(SqliteRecordRepository::new(pool)), clock, bus)
    }

    async fn no_deletes() -> Result<HashSet<ClientId>, AppError> {
        Ok(HashSet::new())
    }

    fn chore(id: &str) -> Chore {
        Chore::new(ClientId::new(id.into()).unwrap(), "Feed pigs".into(), 0).unwrap()
    }

    #[tokio::test]
    async fn optimistic_writes_are_pending_and_monotonic() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = store(clock.clone()).await;

        let first = store.put_optimistic(chore("a")).await.unwrap();
        assert_eq!(first.last_modified, 1_000);
        assert_eq!(first.sync_status, SyncStatus::Pending);

        // Clock went backwards; the stamp must not.
        clock.set(500);
        let second = store.put_optimistic(first.clone()).await.unwrap();
        assert_eq!(second.last_modified, 1_001);
    }

    #[tokio::test]
    async fn mark_synced_respects_newer_local_edits() {
        let clock = Arc::new(ManualClock::new(100));
        let store = store(clock.clone()).await;
        let written = store.put_optimistic(chore("a")).await.unwrap();

        clock.set(200);
        let newer = store.put_optimistic(written.clone()).await.unwrap();

        assert!(!store.mark_synced(&written.id, Some(100)).await.unwrap());
        let current = store.get(&written.id).await.unwrap().unwrap();
        assert_eq!(current.sync_status, SyncStatus::Pending);

        assert!(store.mark_synced(&newer.id, Some(200)).await.unwrap());
        let current = store.get(&written.id).await.unwrap().unwrap();
        assert_eq!(current.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn projection_reloads_from_durable_rows() {
        let clock = Arc::new(ManualClock::new(10));
        let store = store(clock).await;
        store.put_optimistic(chore("a")).await.unwrap();
        store.put_optimistic(chore("b")).await.unwrap();
        store.remove(&ClientId::new("a".into()).unwrap()).await.unwrap();

        let loaded = store.load(None).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(store.items().await.len(), 1);
        assert_eq!(store.items().await[0].id.as_str(), "b");
    }

    #[tokio::test]
    async fn failed_records_can_be_reset() {
        let clock = Arc::new(ManualClock::new(10));
        let store = store(clock).await;
        let record = store.put_optimistic(chore("a")).await.unwrap();
        store.mark_failed(&record.id, "rejected").await.unwrap();
        assert_eq!(store.count_by_status(SyncStatus::Failed).await.unwrap(), 1);

        assert_eq!(store.reset_failed_to_pending().await.unwrap(), 1);
        assert_eq!(store.count_by_status(SyncStatus::Pending).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn hydrate_writes_nothing_when_unchanged() {
        let clock = Arc::new(ManualClock::new(10));
        let store = store(clock).await;
        let mut server = chore("s");
        server.sync_status = SyncStatus::Synced;
        server.last_modified = 50;

        let report = store
            .hydrate(vec![server.clone()], None, no_deletes, SnapshotKind::Complete)
            .await
            .unwrap();
        assert_eq!(report.upserted, 1);

        let again = store
            .hydrate(vec![server], None, no_deletes, SnapshotKind::Complete)
            .await
            .unwrap();
        assert_eq!(again, HydrationReport::default());
    }

    #[tokio::test]
    async fn delete_landing_during_a_fetch_is_honoured() {
        let clock = Arc::new(ManualClock::new(10));
        let store = store(clock).await;
        let local = store.put_optimistic(chore("a")).await.unwrap();
        let mut server = local.clone();
        server.sync_status = SyncStatus::Synced;
        let queued_deletes = Arc::new(Mutex::new(HashSet::new()));

        // The local delete holds the gate while the snapshot is being merged.
        let gate = store.write_gate.lock().await;
        let loader = {
            let queued = queued_deletes.clone();
            move || async move { Ok::<_, AppError>(queued.lock().await.clone()) }
        };
        let hydrate = store.hydrate(vec![server], None, loader, SnapshotKind::Complete);
        let delete = async {
            queued_deletes.lock().await.insert(local.id.clone());
            store.repository.delete(Table::Chores, &local.id).await.unwrap();
            store.projection.write().await.remove(&local.id);
            drop(gate);
        };
        let (report, ()) = tokio::join!(hydrate, delete);

        assert_eq!(report.unwrap().upserted, 0);
        assert!(store.get(&local.id).await.unwrap().is_none());
    }
}
