pub mod blob_transport;
pub mod http_backend;
pub mod memory_backend;

pub use blob_transport::HttpBlobTransport;
pub use http_backend::HttpRemoteBackend;
pub use memory_backend::{BackendOp, InMemoryBackend};
