pub mod ports;
pub mod services;

pub use services::{
    ChoreService, ConnectivityMonitor, DailyChoreService, HydrationService, MutationQueue,
    PhotoQueue, RecordStore, SyncBus, SyncEngine,
};
