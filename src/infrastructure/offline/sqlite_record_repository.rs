use super::mappers::record_from_row;
use super::rows::RecordRow;
use crate::application::ports::{RecordRepository, StoredRecord};
use crate::domain::value_objects::{ClientId, SyncStatus, Table};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};

const UPSERT_RECORD: &str = r#"
    INSERT INTO records (table_name, client_id, scope, sync_status, last_modified, data)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(table_name, client_id) DO UPDATE SET
        scope = excluded.scope,
        sync_status = excluded.sync_status,
        last_modified = excluded.last_modified,
        data = excluded.data
"#;

#[derive(Clone)]
pub struct SqliteRecordRepository {
    pool: ConnectionPool,
}

impl SqliteRecordRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &SqlitePool {
        self.pool.get_pool()
    }

    async fn upsert_in(
        tx: &mut Transaction<'_, Sqlite>,
        record: &StoredRecord,
    ) -> Result<(), AppError> {
        let data = serde_json::to_string(&record.data)?;
        sqlx::query(UPSERT_RECORD)
            .bind(record.table.as_str())
            .bind(record.client_id.as_str())
            .bind(record.scope.as_deref())
            .bind(record.sync_status.as_str())
            .bind(record.last_modified)
            .bind(data)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordRepository for SqliteRecordRepository {
    async fn get(&self, table: Table, id: &ClientId) -> Result<Option<StoredRecord>, AppError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT table_name, client_id, scope, sync_status, last_modified, data
            FROM records
            WHERE table_name = ?1 AND client_id = ?2
            "#,
        )
        .bind(table.as_str())
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn put(&self, record: StoredRecord) -> Result<(), AppError> {
        let mut tx = self.pool().begin().await?;
        Self::upsert_in(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, table: Table, id: &ClientId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM records WHERE table_name = ?1 AND client_id = ?2")
            .bind(table.as_str())
            .bind(id.as_str())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_batch(
        &self,
        table: Table,
        upserts: Vec<StoredRecord>,
        deletes: Vec<ClientId>,
    ) -> Result<(), AppError> {
        if upserts.is_empty() && deletes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;
        for record in &upserts {
            if record.table != table {
                return Err(AppError::InvalidInput(format!(
                    "Record {} belongs to {}, batch is for {}",
                    record.client_id, record.table, table
                )));
            }
            Self::upsert_in(&mut tx, record).await?;
        }
        for id in &deletes {
            sqlx::query("DELETE FROM records WHERE table_name = ?1 AND client_id = ?2")
                .bind(table.as_str())
                .bind(id.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self, table: Table, scope: Option<&str>) -> Result<Vec<StoredRecord>, AppError> {
        let rows = match scope {
            Some(scope) => {
                sqlx::query_as::<_, RecordRow>(
                    r#"
                    SELECT table_name, client_id, scope, sync_status, last_modified, data
                    FROM records
                    WHERE table_name = ?1 AND scope = ?2
                    ORDER BY last_modified ASC, client_id ASC
                    "#,
                )
                .bind(table.as_str())
                .bind(scope)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, RecordRow>(
                    r#"
                    SELECT table_name, client_id, scope, sync_status, last_modified, data
                    FROM records
                    WHERE table_name = ?1
                    ORDER BY last_modified ASC, client_id ASC
                    "#,
                )
                .bind(table.as_str())
                .fetch_all(self.pool())
                .await?
            }
        };

        rows.into_iter().map(record_from_row).collect()
    }

    async fn list_by_status(
        &self,
        table: Table,
        status: SyncStatus,
    ) -> Result<Vec<StoredRecord>, AppError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT table_name, client_id, scope, sync_status, last_modified, data
            FROM records
            WHERE table_name = ?1 AND sync_status = ?2
            ORDER BY last_modified ASC, client_id ASC
            "#,
        )
        .bind(table.as_str())
        .bind(status.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn repository() -> SqliteRecordRepository {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        SqliteRecordRepository::new(pool)
    }

    fn record(id: &str, scope: Option<&str>, status: SyncStatus, ts: i64) -> StoredRecord {
        StoredRecord {
            table: Table::DailyChores,
            client_id: ClientId::new(id.into()).unwrap(),
            scope: scope.map(str::to_string),
            sync_status: status,
            last_modified: ts,
            data: json!({ "clientId": id, "lastModified": ts }),
        }
    }

    #[tokio::test]
    async fn put_overwrites_existing_record() {
        let repo = repository().await;
        repo.put(record("a", None, SyncStatus::Pending, 1)).await.unwrap();
        repo.put(record("a", None, SyncStatus::Synced, 2)).await.unwrap();

        let stored = repo
            .get(Table::DailyChores, &ClientId::new("a".into()).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
        assert_eq!(stored.last_modified, 2);
        assert!(repo.get(Table::Chores, &stored.client_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_filters_by_scope_and_status() {
        let repo = repository().await;
        repo.put(record("a", Some("2025-05-01"), SyncStatus::Synced, 1))
            .await
            .unwrap();
        repo.put(record("b", Some("2025-05-02"), SyncStatus::Pending, 2))
            .await
            .unwrap();

        let day = repo.list(Table::DailyChores, Some("2025-05-01")).await.unwrap();
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].client_id.as_str(), "a");

        let pending = repo
            .list_by_status(Table::DailyChores, SyncStatus::Pending)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(repo.list(Table::DailyChores, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_is_rejected_as_a_whole() {
        let repo = repository().await;
        repo.put(record("keep", None, SyncStatus::Synced, 1)).await.unwrap();

        let mut foreign = record("x", None, SyncStatus::Synced, 5);
        foreign.table = Table::Chores;
        let result = repo
            .apply_batch(
                Table::DailyChores,
                vec![record("new", None, SyncStatus::Synced, 3), foreign],
                vec![ClientId::new("keep".into()).unwrap()],
            )
            .await;

        assert!(result.is_err());
        let remaining = repo.list(Table::DailyChores, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].client_id.as_str(), "keep");
    }
}
