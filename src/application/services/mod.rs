pub mod chore_service;
pub mod connectivity;
pub mod credentials;
pub mod daily_chore_service;
pub mod hydration_service;
pub mod merge;
pub mod mutation_queue;
pub mod photo_queue;
pub mod record_store;
pub mod sync_bus;
pub mod sync_engine;

pub use chore_service::{ChoreCounts, ChoreService};
pub use connectivity::{ConnectivityMonitor, ConnectivityState};
pub use credentials::Credentials;
pub use daily_chore_service::{DailyChoreService, DailyProgress};
pub use hydration_service::HydrationService;
pub use merge::{MergeOutcome, SnapshotKind, merge_snapshot};
pub use mutation_queue::MutationQueue;
pub use photo_queue::{PhotoQueue, RetrySchedule};
pub use record_store::{HydrationReport, RecordStore};
pub use sync_bus::{DrainKind, SyncBus, SyncEvent, SyncTrigger};
pub use sync_engine::{
    DrainReport, MutationOutcome, PhotoOutcome, SyncEngine, SyncEngineConfig, SyncEngineDeps,
    SyncStatusSnapshot,
};
