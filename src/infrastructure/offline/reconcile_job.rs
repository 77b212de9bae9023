use crate::application::ports::RecordRepository;
use crate::application::services::MutationQueue;
use crate::domain::entities::{
    AddAdHocArgs, Chore, CreateChoreArgs, DailyChore, MutationPayload, UpdateChoreArgs,
    UpdateDailyChoreArgs,
};
use crate::domain::value_objects::{MutationKind, SyncStatus, Table};
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequeuedRecord {
    pub table: Table,
    pub client_id: String,
    pub mutations: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub pending_record_count: usize,
    pub failed_record_count: usize,
    pub queued_mutation_count: u64,
    pub requeued: Vec<RequeuedRecord>,
    pub emitted_at: i64,
}

/// Finds records left `pending` with nothing queued for them, which happens
/// when the process stops between the local write and the enqueue (or
/// between removing an applied mutation and marking its record synced), and
/// queues their current state again.
///
/// Re-sent creates are idempotent remotely and the follow-up update carries
/// the local timestamp, so replays converge.
pub struct QueueReconcileJob {
    records: Arc<dyn RecordRepository>,
    mutations: Arc<MutationQueue>,
    clock: Arc<dyn Clock>,
    gate: Mutex<()>,
}

impl QueueReconcileJob {
    pub fn new(
        records: Arc<dyn RecordRepository>,
        mutations: Arc<MutationQueue>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            records,
            mutations,
            clock,
            gate: Mutex::new(()),
        })
    }

    pub fn trigger(self: &Arc<Self>) {
        let job = Arc::clone(self);
        tokio::spawn(async move {
            job.run_guarded().await;
        });
    }

    pub async fn reconcile_once(&self) -> Result<ReconcileReport, AppError> {
        let _guard = self.gate.lock().await;
        let mut report = ReconcileReport::default();

        for table in Table::ALL {
            let pending = self.records.list_by_status(table, SyncStatus::Pending).await?;
            report.pending_record_count += pending.len();
            report.failed_record_count += self
                .records
                .list_by_status(table, SyncStatus::Failed)
                .await?
                .len();

            for stored in pending {
                if self
                    .mutations
                    .has_entries_for(table, &stored.client_id)
                    .await?
                {
                    continue;
                }
                let client_id = stored.client_id.to_string();
                let payloads = match table {
                    Table::Chores => chore_payloads(&stored.into_record::<Chore>()?),
                    Table::DailyChores => {
                        daily_chore_payloads(&stored.into_record::<DailyChore>()?)
                    }
                };
                for (kind, payload) in &payloads {
                    self.mutations.enqueue(*kind, table, payload.clone()).await?;
                }
                tracing::warn!(
                    table = table.as_str(),
                    client_id = %client_id,
                    mutations = payloads.len(),
                    "re-queued pending record with no queued mutation"
                );
                report.requeued.push(RequeuedRecord {
                    table,
                    client_id,
                    mutations: payloads.len(),
                });
            }
        }

        report.queued_mutation_count = self.mutations.count().await?;
        report.emitted_at = self.clock.now_ms();
        Ok(report)
    }

    async fn run_guarded(self: Arc<Self>) {
        match self.reconcile_once().await {
            Ok(report) => {
                tracing::info!(
                    pending = report.pending_record_count,
                    requeued = report.requeued.len(),
                    queued = report.queued_mutation_count,
                    "queue reconcile finished"
                );
            }
            Err(err) => {
                tracing::error!(error = %err, "queue reconcile failed");
            }
        }
    }
}

fn chore_payloads(chore: &Chore) -> Vec<(MutationKind, MutationPayload)> {
    vec![
        (
            MutationKind::Create,
            MutationPayload::CreateChore(CreateChoreArgs::from(chore)),
        ),
        (
            MutationKind::Update,
            MutationPayload::UpdateChore(UpdateChoreArgs::from(chore)),
        ),
    ]
}

// Scheduled daily chores are created server-side; only ad-hoc ones are created here.
fn daily_chore_payloads(chore: &DailyChore) -> Vec<(MutationKind, MutationPayload)> {
    let mut payloads = Vec::with_capacity(2);
    if chore.is_ad_hoc {
        payloads.push((
            MutationKind::Create,
            MutationPayload::CreateDailyChore(AddAdHocArgs::from(chore)),
        ));
    }
    payloads.push((
        MutationKind::Update,
        MutationPayload::UpdateDailyChore(UpdateDailyChoreArgs::from(chore)),
    ));
    payloads
}
