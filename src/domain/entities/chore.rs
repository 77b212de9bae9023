use super::sync_record::{SyncRecord, default_sync_status};
use crate::domain::value_objects::{ClientId, SyncStatus, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chore {
    #[serde(rename = "clientId")]
    pub id: ClientId,
    pub text: String,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    /// Local-only; server copies arrive without it and are synced by definition.
    #[serde(default = "default_sync_status")]
    pub sync_status: SyncStatus,
    pub last_modified: i64,
}

impl Chore {
    pub fn new(id: ClientId, text: String, last_modified: i64) -> Result<Self, String> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err("Chore text cannot be empty".to_string());
        }
        Ok(Self {
            id,
            text,
            is_completed: false,
            completed_at: None,
            completed_by: None,
            sync_status: SyncStatus::Pending,
            last_modified,
        })
    }

    pub fn set_completed(&mut self, completed: bool, by: Option<String>, at: DateTime<Utc>) {
        self.is_completed = completed;
        if completed {
            self.completed_at = Some(at);
            self.completed_by = by;
        } else {
            self.completed_at = None;
            self.completed_by = None;
        }
    }
}

impl SyncRecord for Chore {
    const TABLE: Table = Table::Chores;

    fn client_id(&self) -> &ClientId {
        &self.id
    }

    fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    fn set_sync_status(&mut self, status: SyncStatus) {
        self.sync_status = status;
    }

    fn last_modified(&self) -> i64 {
        self.last_modified
    }

    fn set_last_modified(&mut self, ms: i64) {
        self.last_modified = ms;
    }
}
