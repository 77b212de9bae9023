pub mod chore;
pub mod daily_chore;
pub mod mutation;
pub mod photo_queue_entry;
pub mod sync_record;

pub use chore::Chore;
pub use daily_chore::{DailyChore, NewAdHocChore};
pub use mutation::{
    AddAdHocArgs, CreateChoreArgs, Mutation, MutationPayload, RemoveArgs, UpdateChoreArgs,
    UpdateDailyChoreArgs,
};
pub use photo_queue_entry::{CapturedPhoto, PhotoQueueEntry, checksum_hex};
pub use sync_record::SyncRecord;
