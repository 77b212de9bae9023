pub mod entities;
pub mod value_objects;

pub use entities::{Chore, DailyChore, Mutation, MutationPayload, PhotoQueueEntry, SyncRecord};
pub use value_objects::{ClientId, MutationKind, SyncStatus, Table};
