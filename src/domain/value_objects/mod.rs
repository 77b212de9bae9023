pub mod backoff;
pub mod chore_date;
pub mod client_id;
pub mod local_ids;
pub mod status;
pub mod table;
pub mod time_slot;

pub use backoff::{BackoffTable, DEFAULT_PHOTO_BACKOFF_SECS};
pub use chore_date::{ROLLOVER_HOUR, effective_date, format_date, parse_date};
pub use client_id::ClientId;
pub use local_ids::{AccessKey, MutationId, PhotoId, StorageId};
pub use status::{PhotoStatus, SyncStatus, UploadStatus};
pub use table::{MutationKind, Table};
pub use time_slot::TimeSlot;
