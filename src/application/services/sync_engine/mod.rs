mod mutations;
mod photos;
mod status;

pub use mutations::MutationOutcome;
pub use photos::PhotoOutcome;
pub use status::SyncStatusSnapshot;

use super::connectivity::ConnectivityMonitor;
use super::credentials::Credentials;
use super::hydration_service::HydrationService;
use super::mutation_queue::MutationQueue;
use super::photo_queue::PhotoQueue;
use super::record_store::RecordStore;
use super::sync_bus::{DrainKind, SyncBus, SyncEvent, SyncTrigger};
use crate::application::ports::{BlobTransport, RemoteBackend};
use crate::domain::entities::{Chore, DailyChore};
use crate::domain::value_objects::AccessKey;
use crate::shared::clock::Clock;
use crate::shared::config::AppConfig;
use crate::shared::error::{AppError, RemoteError};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    pub max_retries: u32,
    pub photo_max_retries: u32,
    pub rpc_timeout: Duration,
    pub blob_timeout: Duration,
    pub pull_after_sync: bool,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            photo_max_retries: 5,
            rpc_timeout: Duration::from_secs(10),
            blob_timeout: Duration::from_secs(60),
            pull_after_sync: false,
        }
    }
}

impl From<&AppConfig> for SyncEngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_retries: config.sync.max_retries,
            photo_max_retries: config.sync.photo_max_retries,
            rpc_timeout: config.remote.rpc_timeout(),
            blob_timeout: config.remote.blob_timeout(),
            pull_after_sync: config.sync.pull_after_sync,
        }
    }
}

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Entries left for a later pass (blocked entity, failed, or backing off).
    pub deferred: usize,
    /// The pass did not run (offline or another pass in progress).
    pub skipped: bool,
}

impl DrainReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Clears its flag when the drain ends, however it ends.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct EngineState {
    last_synced_at: Option<i64>,
    last_error: Option<String>,
}

/// Drains the mutation and photo queues against the remote backend.
///
/// The two drains run independently; each is serialized by its own flag so a
/// trigger arriving mid-pass requests one follow-up pass instead of a second,
/// overlapping one.
pub struct SyncEngine {
    backend: Arc<dyn RemoteBackend>,
    blobs: Arc<dyn BlobTransport>,
    mutations: Arc<MutationQueue>,
    photos: Arc<PhotoQueue>,
    chores: Arc<RecordStore<Chore>>,
    daily_chores: Arc<RecordStore<DailyChore>>,
    connectivity: Arc<ConnectivityMonitor>,
    credentials: Credentials,
    hydration: Option<Arc<HydrationService>>,
    bus: SyncBus,
    clock: Arc<dyn Clock>,
    config: SyncEngineConfig,
    syncing: AtomicBool,
    uploading: AtomicBool,
    mutation_rerun: AtomicBool,
    photo_rerun: AtomicBool,
    state: RwLock<EngineState>,
}

/// Collaborators the engine drains against and writes back to.
pub struct SyncEngineDeps {
    pub backend: Arc<dyn RemoteBackend>,
    pub blobs: Arc<dyn BlobTransport>,
    pub mutations: Arc<MutationQueue>,
    pub photos: Arc<PhotoQueue>,
    pub chores: Arc<RecordStore<Chore>>,
    pub daily_chores: Arc<RecordStore<DailyChore>>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub credentials: Credentials,
    pub bus: SyncBus,
    pub clock: Arc<dyn Clock>,
}

impl SyncEngine {
    pub fn new(deps: SyncEngineDeps, config: SyncEngineConfig) -> Self {
        Self {
            backend: deps.backend,
            blobs: deps.blobs,
            mutations: deps.mutations,
            photos: deps.photos,
            chores: deps.chores,
            daily_chores: deps.daily_chores,
            connectivity: deps.connectivity,
            credentials: deps.credentials,
            hydration: None,
            bus: deps.bus,
            clock: deps.clock,
            config,
            syncing: AtomicBool::new(false),
            uploading: AtomicBool::new(false),
            mutation_rerun: AtomicBool::new(false),
            photo_rerun: AtomicBool::new(false),
            state: RwLock::new(EngineState::default()),
        }
    }

    /// Pull fresh snapshots after each successful mutation drain.
    pub fn with_hydration(mut self, hydration: Arc<HydrationService>) -> Self {
        self.hydration = Some(hydration);
        self
    }

    pub async fn set_access_key(&self, access_key: Option<AccessKey>) {
        self.credentials.set_access_key(access_key).await;
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    /// Startup recovery: photos interrupted mid-upload go back to pending.
    pub async fn init(&self) -> Result<SyncStatusSnapshot, AppError> {
        self.photos.reset_interrupted().await?;
        let status = self.status().await?;
        tracing::info!(
            pending_mutations = status.pending_mutations,
            failed_mutations = status.failed_mutations,
            pending_photos = status.pending_photos,
            failed_photos = status.failed_photos,
            "sync engine initialised"
        );
        Ok(status)
    }

    /// Consumes triggers until every sender is gone.
    pub async fn run(self: Arc<Self>, mut triggers: UnboundedReceiver<SyncTrigger>) {
        while let Some(trigger) = triggers.recv().await {
            self.handle_trigger(trigger).await;
        }
        tracing::debug!("sync trigger channel closed, engine loop exiting");
    }

    pub async fn handle_trigger(self: &Arc<Self>, trigger: SyncTrigger) {
        tracing::debug!(?trigger, "sync trigger received");
        if trigger == SyncTrigger::Reconnected {
            if let Err(err) = self.photos.reset_failed().await {
                tracing::error!(error = %err, "failed to reset failed photos on reconnect");
            }
        }

        if trigger != SyncTrigger::PhotoEnqueued {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = engine.sync_now().await {
                    tracing::error!(error = %err, "mutation drain aborted");
                }
            });
        }
        if trigger != SyncTrigger::Enqueued {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(err) = engine.process_photos().await {
                    tracing::error!(error = %err, "photo drain aborted");
                }
            });
        }
    }

    /// Drains mutations, then refreshes local state from the server when configured.
    pub async fn sync_now(&self) -> Result<DrainReport, AppError> {
        let report = self.process_queue().await?;
        if report.skipped || !self.config.pull_after_sync {
            return Ok(report);
        }
        if let Some(hydration) = &self.hydration {
            if let Err(err) = hydration.refresh().await {
                tracing::warn!(error = %err, "post-sync refresh failed");
            }
        }
        Ok(report)
    }

    async fn record_drain_error(&self, err: &AppError) {
        self.state.write().await.last_error = Some(err.to_string());
    }

    fn finish_drain(&self, kind: DrainKind, report: &DrainReport) {
        self.bus.emit(SyncEvent::DrainFinished {
            kind,
            processed: report.processed,
            failed: report.failed,
        });
    }

    async fn with_timeout<T, F>(&self, limit: Duration, call: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(format!("no response within {limit:?}"))),
        }
    }
}
