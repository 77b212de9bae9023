use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub table_name: String,
    pub client_id: String,
    pub scope: Option<String>,
    pub sync_status: String,
    pub last_modified: i64,
    pub data: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct MutationRow {
    pub id: String,
    pub kind: String,
    pub table_name: String,
    pub target_id: String,
    pub payload: String,
    pub created_at: i64,
    pub retry_count: i64,
    pub failed_at: Option<i64>,
}

#[derive(Clone, FromRow)]
pub struct PhotoRow {
    pub id: String,
    pub daily_chore_id: String,
    pub blob: Vec<u8>,
    pub thumbnail: Option<Vec<u8>>,
    pub mime_type: String,
    pub original_size: i64,
    pub compressed_size: i64,
    pub checksum: String,
    pub captured_at: i64,
    pub captured_by: String,
    pub upload_status: String,
    pub retry_count: i64,
    pub last_attempt_at: Option<i64>,
    pub next_retry_at: Option<i64>,
}
