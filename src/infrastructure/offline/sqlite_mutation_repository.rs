use super::mappers::mutation_from_row;
use super::rows::MutationRow;
use crate::application::ports::MutationRepository;
use crate::domain::entities::Mutation;
use crate::domain::value_objects::{ClientId, MutationId, MutationKind, Table};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

const SELECT_MUTATION: &str = r#"
    SELECT id, kind, table_name, target_id, payload, created_at, retry_count, failed_at
    FROM mutation_queue
"#;

#[derive(Clone)]
pub struct SqliteMutationRepository {
    pool: ConnectionPool,
}

impl SqliteMutationRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &SqlitePool {
        self.pool.get_pool()
    }
}

#[async_trait]
impl MutationRepository for SqliteMutationRepository {
    async fn insert(&self, mutation: &Mutation) -> Result<(), AppError> {
        let payload = serde_json::to_string(&mutation.payload)?;
        sqlx::query(
            r#"
            INSERT INTO mutation_queue (
                id, kind, table_name, target_id, payload, created_at, retry_count, failed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(mutation.id.as_str())
        .bind(mutation.kind.as_str())
        .bind(mutation.table.as_str())
        .bind(mutation.target_id().as_str())
        .bind(payload)
        .bind(mutation.created_at)
        .bind(i64::from(mutation.retry_count))
        .bind(mutation.failed_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Mutation>, AppError> {
        let rows = sqlx::query_as::<_, MutationRow>(&format!(
            "{SELECT_MUTATION} ORDER BY created_at ASC, seq ASC"
        ))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(mutation_from_row).collect()
    }

    async fn get(&self, id: &MutationId) -> Result<Option<Mutation>, AppError> {
        let row = sqlx::query_as::<_, MutationRow>(&format!("{SELECT_MUTATION} WHERE id = ?1"))
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;

        row.map(mutation_from_row).transpose()
    }

    async fn remove(&self, id: &MutationId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM mutation_queue WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_retry(&self, id: &MutationId) -> Result<u32, AppError> {
        let row = sqlx::query(
            r#"
            UPDATE mutation_queue
            SET retry_count = retry_count + 1
            WHERE id = ?1
            RETURNING retry_count
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => {
                let count: i64 = row.try_get("retry_count")?;
                Ok(u32::try_from(count).unwrap_or(u32::MAX))
            }
            None => Err(AppError::NotFound(format!("Mutation {id} not found"))),
        }
    }

    async fn mark_failed(&self, id: &MutationId, failed_at: i64) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE mutation_queue SET failed_at = ?2 WHERE id = ?1")
            .bind(id.as_str())
            .bind(failed_at)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Mutation {id} not found")));
        }
        Ok(())
    }

    async fn reset_failed(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE mutation_queue
            SET failed_at = NULL, retry_count = 0
            WHERE failed_at IS NOT NULL
            "#,
        )
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mutation_queue")
            .fetch_one(self.pool())
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_failed(&self) -> Result<u64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM mutation_queue WHERE failed_at IS NOT NULL")
                .fetch_one(self.pool())
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn targets(&self, table: Table, kind: MutationKind) -> Result<Vec<ClientId>, AppError> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT target_id
            FROM mutation_queue
            WHERE table_name = ?1 AND kind = ?2
            "#,
        )
        .bind(table.as_str())
        .bind(kind.as_str())
        .fetch_all(self.pool())
        .await?;

        ids.into_iter()
            .map(|id| ClientId::new(id).map_err(AppError::DeserializationError))
            .collect()
    }

    async fn has_entries_for(&self, table: Table, id: &ClientId) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM mutation_queue WHERE table_name = ?1 AND target_id = ?2",
        )
        .bind(table.as_str())
        .bind(id.as_str())
        .fetch_one(self.pool())
        .await?;
        Ok(count > 0)
    }

    async fn clear(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM mutation_queue")
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
