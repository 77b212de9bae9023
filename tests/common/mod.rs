use std::path::Path;
use std::sync::Arc;

use chore_sync_lib::domain::entities::{CapturedPhoto, DailyChore};
use chore_sync_lib::domain::value_objects::{ClientId, SyncStatus, TimeSlot};
use chore_sync_lib::infrastructure::database::ConnectionPool;
use chore_sync_lib::infrastructure::remote::InMemoryBackend;
use chore_sync_lib::shared::clock::ManualClock;
use chore_sync_lib::shared::config::AppConfig;
use chore_sync_lib::state::{AppState, RemoteHandles};

#[allow(dead_code)]
pub const START_MS: i64 = 1_000;

pub struct TestApp {
    pub state: AppState,
    pub backend: Arc<InMemoryBackend>,
    pub clock: Arc<ManualClock>,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.sync.auto_sync = false;
    config.sync.pull_after_sync = false;
    config.sync.max_retries = 3;
    config.sync.photo_backoff_secs = vec![1, 2, 4];
    config
}

pub async fn memory_app() -> TestApp {
    let pool = ConnectionPool::from_memory().await.expect("in-memory sqlite");
    pool.migrate().await.expect("migrations");
    build(pool, Arc::new(InMemoryBackend::new()), Arc::new(ManualClock::new(START_MS))).await
}

/// App over a sqlite file in `dir`; reopening the same dir simulates a restart.
#[allow(dead_code)]
pub async fn file_app(
    dir: &Path,
    backend: Arc<InMemoryBackend>,
    clock: Arc<ManualClock>,
) -> TestApp {
    let url = format!("sqlite://{}?mode=rwc", dir.join("chores.db").display());
    let pool = ConnectionPool::new(&url, 1).await.expect("file sqlite");
    pool.migrate().await.expect("migrations");
    build(pool, backend, clock).await
}

async fn build(
    pool: ConnectionPool,
    backend: Arc<InMemoryBackend>,
    clock: Arc<ManualClock>,
) -> TestApp {
    let state = AppState::with_parts(
        test_config(),
        pool,
        RemoteHandles::in_memory(backend.clone()),
        clock.clone(),
    )
    .await
    .expect("app state");
    TestApp {
        state,
        backend,
        clock,
    }
}

pub fn id(value: &str) -> ClientId {
    ClientId::new(value.to_string()).expect("client id")
}

/// A scheduled daily chore as the server would create it.
#[allow(dead_code)]
pub fn scheduled_chore(value: &str, date: &str, last_modified: i64) -> DailyChore {
    DailyChore {
        id: id(value),
        date: date.to_string(),
        master_chore_id: Some("master-eggs".into()),
        text: format!("Scheduled {value}"),
        description: None,
        time_slot: TimeSlot::Morning,
        animal_category: "poultry".into(),
        sort_order: 1,
        is_completed: false,
        completed_at: None,
        completed_by: None,
        is_ad_hoc: false,
        requires_photo: true,
        photo_storage_id: None,
        thumbnail_storage_id: None,
        photo_captured_at: None,
        photo_captured_by: None,
        photo_status: None,
        sync_status: SyncStatus::Synced,
        last_modified,
    }
}

#[allow(dead_code)]
pub fn captured_photo(chore: &ClientId) -> CapturedPhoto {
    let blob: Vec<u8> = (0..128).collect();
    CapturedPhoto {
        daily_chore_id: chore.clone(),
        original_size: blob.len() as u64 * 4,
        blob,
        thumbnail: Some(vec![7; 16]),
        mime_type: "image/jpeg".into(),
        captured_by: "Ana".into(),
    }
}
