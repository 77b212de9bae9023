use crate::application::ports::{
    BlobTransport, MutationRepository, PhotoRepository, RecordRepository, RemoteBackend,
};
use crate::application::services::{
    ChoreService, ConnectivityMonitor, Credentials, DailyChoreService, HydrationService,
    MutationQueue, PhotoQueue, RecordStore, SyncBus, SyncEngine, SyncEngineConfig,
    SyncEngineDeps, SyncTrigger,
};
use crate::domain::entities::{Chore, DailyChore};
use crate::domain::value_objects::{AccessKey, BackoffTable, StorageId};
use crate::infrastructure::cache::{CachedImage, ImageCache, ImageCacheLimits};
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::offline::{
    QueueReconcileJob, SqliteMutationRepository, SqlitePhotoRepository, SqliteRecordRepository,
};
use crate::infrastructure::remote::{HttpBlobTransport, HttpRemoteBackend, InMemoryBackend};
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::config::AppConfig;
use crate::shared::error::{AppError, RemoteError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Remote collaborators the engine talks to.
#[derive(Clone)]
pub struct RemoteHandles {
    pub backend: Arc<dyn RemoteBackend>,
    pub blobs: Arc<dyn BlobTransport>,
    /// Whether the backend lives in another process and needs connectivity probing.
    pub networked: bool,
}

impl RemoteHandles {
    /// HTTP clients when a deployment URL is configured, otherwise a process-local backend.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        match &config.remote.base_url {
            Some(base_url) => {
                let backend = HttpRemoteBackend::new(base_url, config.remote.rpc_timeout())?;
                let blobs = HttpBlobTransport::new(config.remote.blob_timeout())?;
                tracing::info!(base_url = %base_url, "using remote backend");
                Ok(Self {
                    backend: Arc::new(backend),
                    blobs: Arc::new(blobs),
                    networked: true,
                })
            }
            None => {
                tracing::info!("no remote url configured, using in-memory backend");
                Ok(Self::in_memory(Arc::new(InMemoryBackend::new())))
            }
        }
    }

    pub fn in_memory(backend: Arc<InMemoryBackend>) -> Self {
        Self {
            backend: backend.clone(),
            blobs: backend,
            networked: false,
        }
    }
}

/// Every service of the sync engine, wired once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pool: ConnectionPool,
    pub bus: SyncBus,
    pub clock: Arc<dyn Clock>,
    pub credentials: Credentials,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub remote: RemoteHandles,
    pub chores: Arc<RecordStore<Chore>>,
    pub daily_chores: Arc<RecordStore<DailyChore>>,
    pub mutations: Arc<MutationQueue>,
    pub photos: Arc<PhotoQueue>,
    pub hydration: Arc<HydrationService>,
    pub engine: Arc<SyncEngine>,
    pub chore_service: Arc<ChoreService>,
    pub daily_chore_service: Arc<DailyChoreService>,
    pub reconcile_job: Arc<QueueReconcileJob>,
    pub image_cache: Arc<ImageCache>,
    triggers: Arc<Mutex<Option<UnboundedReceiver<SyncTrigger>>>>,
}

impl AppState {
    /// Opens the configured database and remote, then wires the services.
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.storage.data_dir)?;

        let pool =
            ConnectionPool::new(&config.database.url, config.database.max_connections).await?;
        pool.migrate().await?;
        let remote = RemoteHandles::from_config(&config)?;

        Self::with_parts(config, pool, remote, Arc::new(SystemClock)).await
    }

    /// Wires the services over an already migrated pool.
    pub async fn with_parts(
        config: AppConfig,
        pool: ConnectionPool,
        remote: RemoteHandles,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let (bus, triggers) = SyncBus::new();
        let access_key = match config.remote.access_key.clone() {
            Some(key) => Some(AccessKey::new(key).map_err(AppError::ConfigurationError)?),
            None => None,
        };
        let credentials = Credentials::new(access_key);
        let connectivity = Arc::new(ConnectivityMonitor::new(true, bus.clone(), clock.clone()));

        let record_repository: Arc<dyn RecordRepository> =
            Arc::new(SqliteRecordRepository::new(pool.clone()));
        let mutation_repository: Arc<dyn MutationRepository> =
            Arc::new(SqliteMutationRepository::new(pool.clone()));
        let photo_repository: Arc<dyn PhotoRepository> =
            Arc::new(SqlitePhotoRepository::new(pool.clone()));

        let chores = Arc::new(RecordStore::new(
            record_repository.clone(),
            clock.clone(),
            bus.clone(),
        ));
        let daily_chores = Arc::new(RecordStore::new(
            record_repository.clone(),
            clock.clone(),
            bus.clone(),
        ));
        let mutations = Arc::new(MutationQueue::new(
            mutation_repository,
            clock.clone(),
            bus.clone(),
        ));
        let backoff = BackoffTable::from_secs(&config.sync.photo_backoff_secs)
            .map_err(AppError::ConfigurationError)?;
        let photos = Arc::new(PhotoQueue::new(
            photo_repository,
            clock.clone(),
            bus.clone(),
            backoff,
        ));

        let hydration = Arc::new(HydrationService::new(
            remote.backend.clone(),
            chores.clone(),
            daily_chores.clone(),
            mutations.clone(),
            credentials.clone(),
            clock.clone(),
            config.remote.rpc_timeout(),
        ));
        let engine = Arc::new(
            SyncEngine::new(
                SyncEngineDeps {
                    backend: remote.backend.clone(),
                    blobs: remote.blobs.clone(),
                    mutations: mutations.clone(),
                    photos: photos.clone(),
                    chores: chores.clone(),
                    daily_chores: daily_chores.clone(),
                    connectivity: connectivity.clone(),
                    credentials: credentials.clone(),
                    bus: bus.clone(),
                    clock: clock.clone(),
                },
                SyncEngineConfig::from(&config),
            )
            .with_hydration(hydration.clone()),
        );

        let chore_service = Arc::new(ChoreService::new(
            chores.clone(),
            mutations.clone(),
            clock.clone(),
        ));
        let daily_chore_service = Arc::new(DailyChoreService::new(
            daily_chores.clone(),
            mutations.clone(),
            photos.clone(),
            clock.clone(),
        ));
        let reconcile_job =
            QueueReconcileJob::new(record_repository, mutations.clone(), clock.clone());
        let image_cache = Arc::new(ImageCache::new(
            pool.clone(),
            clock.clone(),
            ImageCacheLimits {
                max_bytes: config.storage.image_cache_max_bytes,
                max_age: Duration::from_secs(config.storage.image_cache_max_age_secs),
            },
        ));

        Ok(Self {
            config,
            pool,
            bus,
            clock,
            credentials,
            connectivity,
            remote,
            chores,
            daily_chores,
            mutations,
            photos,
            hydration,
            engine,
            chore_service,
            daily_chore_service,
            reconcile_job,
            image_cache,
            triggers: Arc::new(Mutex::new(Some(triggers))),
        })
    }

    /// Recovers interrupted work, loads local state and spawns the background loops.
    ///
    /// Only the first call starts the trigger loop; later calls return no handles.
    pub async fn start(&self) -> anyhow::Result<Vec<JoinHandle<()>>> {
        let Some(triggers) = self.triggers.lock().await.take() else {
            tracing::warn!("sync engine already started");
            return Ok(Vec::new());
        };

        self.engine.init().await?;
        self.chore_service.load().await?;
        let today = self.daily_chore_service.today();
        self.daily_chore_service.load(&today).await?;

        let mut handles = Vec::new();
        let engine = Arc::clone(&self.engine);
        handles.push(tokio::spawn(engine.run(triggers)));

        self.reconcile_job.trigger();

        if self.config.sync.auto_sync {
            handles.push(
                self.connectivity
                    .spawn_periodic(self.config.sync.sync_interval()),
            );
        }
        if self.remote.networked {
            handles.push(self.connectivity.spawn_probe(
                self.remote.backend.clone(),
                self.config.sync.probe_interval(),
                self.config.remote.rpc_timeout(),
            ));
        }

        self.bus.trigger(SyncTrigger::Manual);
        tracing::info!(tasks = handles.len(), "background sync started");
        Ok(handles)
    }

    /// Photo bytes for display, served from the image cache when possible.
    pub async fn load_photo(
        &self,
        storage_id: &StorageId,
    ) -> Result<Option<CachedImage>, AppError> {
        let auth = self.credentials.access_key().await;
        let backend = self.remote.backend.clone();
        let blobs = self.remote.blobs.clone();
        let id = storage_id.clone();
        self.image_cache
            .get_or_fetch(storage_id, || fetch_photo(backend, blobs, id, auth))
            .await
    }

    pub async fn shutdown(&self) {
        self.pool.close().await;
        tracing::info!("database closed");
    }
}

async fn fetch_photo(
    backend: Arc<dyn RemoteBackend>,
    blobs: Arc<dyn BlobTransport>,
    storage_id: StorageId,
    auth: Option<AccessKey>,
) -> Result<Option<(Vec<u8>, String)>, RemoteError> {
    let Some(url) = backend.photo_url(storage_id, auth).await? else {
        return Ok(None);
    };
    match blobs.download(url).await {
        Ok(photo) => Ok(Some(photo)),
        Err(RemoteError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}
