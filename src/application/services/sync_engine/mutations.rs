use super::{DrainGuard, DrainReport, SyncEngine};
use crate::application::services::sync_bus::{DrainKind, SyncEvent};
use crate::domain::entities::{Mutation, MutationPayload};
use crate::domain::value_objects::{ClientId, Table};
use crate::shared::error::{AppError, RemoteError, RetryClass};
use std::collections::HashSet;
use std::sync::atomic::Ordering;

/// What happened to one queued mutation during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    /// Transient failure; stays queued with `retry_count` attempts used.
    Retrying { retry_count: u32 },
    /// Retry budget exhausted; kept as failed until reset.
    Exhausted,
    /// Terminal rejection; the entry was dropped.
    Dropped,
}

impl SyncEngine {
    /// One serialized pass over the mutation queue.
    ///
    /// Every queued entry is attempted once; an entity whose earlier mutation
    /// failed in this pass keeps its later mutations queued so they are never
    /// applied out of order. Entries already parked as failed are skipped and
    /// do not hold back newer edits.
    pub async fn process_queue(&self) -> Result<DrainReport, AppError> {
        if !self.connectivity.is_online() {
            tracing::debug!("offline, mutation drain skipped");
            return Ok(DrainReport::skipped());
        }
        let Some(_guard) = DrainGuard::acquire(&self.syncing) else {
            self.mutation_rerun.store(true, Ordering::Release);
            return Ok(DrainReport::skipped());
        };

        let mut total = DrainReport::default();
        loop {
            self.mutation_rerun.store(false, Ordering::Release);
            let pass = match self.drain_mutations_once().await {
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

            if !self.mutation_rerun.swap(false, Ordering::AcqRel) || !self.connectivity.is_online()
            {
                break;
            }
            tracing::debug!("mutation drain re-run requested during pass");
        }

        {
            let mut state = self.state.write().await;
            state.last_synced_at = Some(self.clock.now_ms());
            if total.failed == 0 {
                state.last_error = None;
            }
        }
        self.finish_drain(DrainKind::Mutations, &total);
        Ok(total)
    }

    async fn drain_mutations_once(&self) -> Result<DrainReport, AppError> {
        let queued = self.mutations.list().await?;
        let mut report = DrainReport::default();
        if queued.is_empty() {
            return Ok(report);
        }
        tracing::info!(count = queued.len(), "draining mutation queue");

        let mut blocked: HashSet<(Table, ClientId)> = HashSet::new();
        for mutation in queued {
            let key = (mutation.table, mutation.target_id().clone());
            if mutation.is_failed() {
                continue;
            }
            if blocked.contains(&key) {
                tracing::debug!(
                    mutation_id = %mutation.id,
                    target = %key.1,
                    "earlier mutation for entity pending, deferring"
                );
                report.deferred += 1;
                continue;
            }

            report.processed += 1;
            match self.apply_mutation(&mutation).await {
                Ok(MutationOutcome::Applied) => report.succeeded += 1,
                Ok(_) => {
                    report.failed += 1;
                    blocked.insert(key);
                }
                Err(err) => {
                    // Local bookkeeping failed for this item; the rest still run.
                    tracing::error!(
                        mutation_id = %mutation.id,
                        error = %err,
                        "failed to record mutation outcome"
                    );
                    self.record_drain_error(&err).await;
                    report.failed += 1;
                    blocked.insert(key);
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            deferred = report.deferred,
            "mutation drain pass finished"
        );
        Ok(report)
    }

    /// Sends one mutation and records the outcome locally.
    pub async fn apply_mutation(&self, mutation: &Mutation) -> Result<MutationOutcome, AppError> {
        match self.dispatch(&mutation.payload).await {
            Ok(()) => {
                self.on_applied(mutation).await?;
                Ok(MutationOutcome::Applied)
            }
            Err(err) => match err.retry_class() {
                RetryClass::Transient => self.on_transient_failure(mutation, &err).await,
                RetryClass::Terminal => self.on_terminal_failure(mutation, &err).await,
            },
        }
    }

    async fn dispatch(&self, payload: &MutationPayload) -> Result<(), RemoteError> {
        let auth = self.credentials.access_key().await;
        let backend = &self.backend;
        let call = async move {
            match payload.clone() {
                MutationPayload::CreateChore(args) => backend.create_chore(args, auth).await,
                MutationPayload::UpdateChore(args) => backend.update_chore(args, auth).await,
                MutationPayload::RemoveChore(args) => backend.remove_chore(args, auth).await,
                MutationPayload::CreateDailyChore(args) => {
                    backend.create_daily_chore(args, auth).await
                }
                MutationPayload::UpdateDailyChore(args) => {
                    backend.update_daily_chore(args, auth).await
                }
                MutationPayload::RemoveDailyChore(args) => {
                    backend.remove_daily_chore(args, auth).await
                }
            }
        };
        self.with_timeout(self.config.rpc_timeout, call).await
    }

    async fn on_applied(&self, mutation: &Mutation) -> Result<(), AppError> {
        self.mutations.remove(&mutation.id).await?;

        let target = mutation.target_id();
        let through = mutation.payload.last_modified();
        // Deletes have no local record left to update.
        if through.is_some() {
            match mutation.table {
                Table::Chores => self.chores.mark_synced(target, through).await?,
                Table::DailyChores => self.daily_chores.mark_synced(target, through).await?,
            };
        }
        tracing::debug!(
            mutation_id = %mutation.id,
            table = mutation.table.as_str(),
            kind = mutation.kind.as_str(),
            target = %target,
            "mutation applied"
        );
        Ok(())
    }

    async fn on_transient_failure(
        &self,
        mutation: &Mutation,
        err: &RemoteError,
    ) -> Result<MutationOutcome, AppError> {
        let retry_count = self.mutations.increment_retry(&mutation.id).await?;
        let target = mutation.target_id().clone();

        if retry_count >= self.config.max_retries {
            self.mutations.mark_failed(&mutation.id).await?;
            let reason = format!("gave up after {retry_count} attempts: {err}");
            self.mark_record_failed(mutation.table, &target, &reason)
                .await?;
            tracing::error!(
                mutation_id = %mutation.id,
                table = mutation.table.as_str(),
                target = %target,
                retry_count,
                error = %err,
                "mutation failed, retries exhausted"
            );
            return Ok(MutationOutcome::Exhausted);
        }

        tracing::warn!(
            mutation_id = %mutation.id,
            target = %target,
            retry_count,
            max_retries = self.config.max_retries,
            error = %err,
            "mutation failed, will retry"
        );
        self.bus.emit(SyncEvent::MutationRetry {
            mutation_id: mutation.id.clone(),
            table: mutation.table,
            client_id: target,
            retry_count,
            error: err.to_string(),
        });
        Ok(MutationOutcome::Retrying { retry_count })
    }

    async fn on_terminal_failure(
        &self,
        mutation: &Mutation,
        err: &RemoteError,
    ) -> Result<MutationOutcome, AppError> {
        let target = mutation.target_id().clone();
        tracing::error!(
            mutation_id = %mutation.id,
            table = mutation.table.as_str(),
            target = %target,
            error = %err,
            "mutation rejected, dropping"
        );
        self.mutations.remove(&mutation.id).await?;
        let reason = err.to_string();
        self.mark_record_failed(mutation.table, &target, &reason)
            .await?;
        self.bus.emit(SyncEvent::MutationDropped {
            mutation_id: mutation.id.clone(),
            table: mutation.table,
            client_id: target,
            reason,
        });
        Ok(MutationOutcome::Dropped)
    }

    async fn mark_record_failed(
        &self,
        table: Table,
        id: &ClientId,
        reason: &str,
    ) -> Result<bool, AppError> {
        match table {
            Table::Chores => self.chores.mark_failed(id, reason).await,
            Table::DailyChores => self.daily_chores.mark_failed(id, reason).await,
        }
    }

    /// Resets failed mutations and records to pending and drains again.
    pub async fn retry_failed(&self) -> Result<u64, AppError> {
        let reset = self.mutations.reset_failed().await?;
        let chores = self.chores.reset_failed_to_pending().await?;
        let daily = self.daily_chores.reset_failed_to_pending().await?;
        tracing::info!(
            mutations = reset,
            records = chores + daily,
            "failed sync work reset for retry"
        );
        self.process_queue().await?;
        Ok(reset)
    }
}
