mod mappers;
pub mod reconcile_job;
mod rows;
pub mod sqlite_mutation_repository;
pub mod sqlite_photo_repository;
pub mod sqlite_record_repository;

pub use reconcile_job::{QueueReconcileJob, ReconcileReport};
pub use sqlite_mutation_repository::SqliteMutationRepository;
pub use sqlite_photo_repository::SqlitePhotoRepository;
pub use sqlite_record_repository::SqliteRecordRepository;
