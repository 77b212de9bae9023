use crate::domain::entities::Mutation;
use crate::domain::value_objects::{ClientId, MutationId, MutationKind, Table};
use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait MutationRepository: Send + Sync {
    async fn insert(&self, mutation: &Mutation) -> Result<(), AppError>;

    /// All entries ordered by `created_at`, ties in insertion order.
    async fn list(&self) -> Result<Vec<Mutation>, AppError>;

    async fn get(&self, id: &MutationId) -> Result<Option<Mutation>, AppError>;

    async fn remove(&self, id: &MutationId) -> Result<bool, AppError>;

    /// Returns the new retry count.
    async fn increment_retry(&self, id: &MutationId) -> Result<u32, AppError>;

    async fn mark_failed(&self, id: &MutationId, failed_at: i64) -> Result<(), AppError>;

    async fn reset_failed(&self) -> Result<u64, AppError>;

    async fn count(&self) -> Result<u64, AppError>;

    async fn count_failed(&self) -> Result<u64, AppError>;

    /// Distinct entity ids with at least one queued entry of `kind` for `table`.
    async fn targets(&self, table: Table, kind: MutationKind) -> Result<Vec<ClientId>, AppError>;

    async fn has_entries_for(&self, table: Table, id: &ClientId) -> Result<bool, AppError>;

    async fn clear(&self) -> Result<u64, AppError>;
}
