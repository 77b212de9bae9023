pub mod mutation_repository;
pub mod photo_repository;
pub mod record_repository;
pub mod remote_backend;

pub use mutation_repository::MutationRepository;
pub use photo_repository::{PhotoRepository, PhotoUploadState};
pub use record_repository::{RecordRepository, StoredRecord};
pub use remote_backend::{AttachPhotoArgs, BlobTransport, RemoteBackend};
