use super::credentials::Credentials;
use super::merge::SnapshotKind;
use super::mutation_queue::MutationQueue;
use super::record_store::{HydrationReport, RecordStore};
use crate::application::ports::RemoteBackend;
use crate::domain::entities::{Chore, DailyChore};
use crate::domain::value_objects::{Table, effective_date, format_date};
use crate::shared::clock::Clock;
use crate::shared::error::{AppError, RemoteError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Fetches server snapshots and folds them into the local stores.
pub struct HydrationService {
    backend: Arc<dyn RemoteBackend>,
    chores: Arc<RecordStore<Chore>>,
    daily_chores: Arc<RecordStore<DailyChore>>,
    mutations: Arc<MutationQueue>,
    credentials: Credentials,
    clock: Arc<dyn Clock>,
    rpc_timeout: Duration,
}

impl HydrationService {
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        chores: Arc<RecordStore<Chore>>,
        daily_chores: Arc<RecordStore<DailyChore>>,
        mutations: Arc<MutationQueue>,
        credentials: Credentials,
        clock: Arc<dyn Clock>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            chores,
            daily_chores,
            mutations,
            credentials,
            clock,
            rpc_timeout,
        }
    }

    pub async fn pull_chores(&self) -> Result<HydrationReport, AppError> {
        let auth = self.credentials.access_key().await;
        let snapshot = self.fetch(self.backend.list_chores(auth)).await?;
        self.chores
            .hydrate(
                snapshot,
                None,
                || self.mutations.pending_deletes(Table::Chores),
                SnapshotKind::Complete,
            )
            .await
    }

    /// Delta pull; absent records are not treated as deleted.
    pub async fn pull_chores_since(&self, since: i64) -> Result<HydrationReport, AppError> {
        let auth = self.credentials.access_key().await;
        let snapshot = self
            .fetch(self.backend.list_chores_since(since, auth))
            .await?;
        self.chores
            .hydrate(
                snapshot,
                None,
                || self.mutations.pending_deletes(Table::Chores),
                SnapshotKind::Delta,
            )
            .await
    }

    pub async fn pull_daily_chores(&self, date: &str) -> Result<HydrationReport, AppError> {
        let auth = self.credentials.access_key().await;
        let snapshot = self
            .fetch(self.backend.list_daily_chores_by_date(date.to_string(), auth))
            .await?;
        self.daily_chores
            .hydrate(
                snapshot,
                Some(date),
                || self.mutations.pending_deletes(Table::DailyChores),
                SnapshotKind::Complete,
            )
            .await
    }

    /// Pulls every chore and today's daily list.
    pub async fn refresh(&self) -> Result<HydrationReport, AppError> {
        let today = format_date(effective_date(self.clock.now_local()));
        let chores = self.pull_chores().await?;
        let daily = self.pull_daily_chores(&today).await?;
        Ok(HydrationReport {
            upserted: chores.upserted + daily.upserted,
            removed: chores.removed + daily.removed,
        })
    }

    async fn fetch<T, F>(&self, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        match tokio::time::timeout(self.rpc_timeout, call).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => Err(AppError::Remote(RemoteError::Timeout(format!(
                "snapshot fetch exceeded {:?}",
                self.rpc_timeout
            )))),
        }
    }
}
