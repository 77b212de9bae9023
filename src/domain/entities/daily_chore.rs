use super::sync_record::{SyncRecord, default_sync_status};
use crate::domain::value_objects::{ClientId, PhotoStatus, SyncStatus, Table, TimeSlot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chore on the list for a given effective date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChore {
    #[serde(rename = "clientId")]
    pub id: ClientId,
    /// `YYYY-MM-DD`
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_chore_id: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub time_slot: TimeSlot,
    pub animal_category: String,
    #[serde(default)]
    pub sort_order: i64,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    #[serde(default)]
    pub is_ad_hoc: bool,
    #[serde(default)]
    pub requires_photo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_storage_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_storage_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_captured_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_captured_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_status: Option<PhotoStatus>,
    #[serde(default = "default_sync_status")]
    pub sync_status: SyncStatus,
    pub last_modified: i64,
}

/// Fields needed to create an ad-hoc chore on a daily list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdHocChore {
    pub text: String,
    pub time_slot: TimeSlot,
    pub animal_category: String,
    pub created_by: Option<String>,
}

impl DailyChore {
    pub fn ad_hoc(
        id: ClientId,
        date: String,
        input: &NewAdHocChore,
        sort_order: i64,
        last_modified: i64,
    ) -> Result<Self, String> {
        let text = input.text.trim().to_string();
        if text.is_empty() {
            return Err("Daily chore text cannot be empty".to_string());
        }
        Ok(Self {
            id,
            date,
            master_chore_id: None,
            text,
            description: None,
            time_slot: input.time_slot,
            animal_category: input.animal_category.trim().to_string(),
            sort_order,
            is_completed: false,
            completed_at: None,
            completed_by: None,
            is_ad_hoc: true,
            requires_photo: false,
            photo_storage_id: None,
            thumbnail_storage_id: None,
            photo_captured_at: None,
            photo_captured_by: None,
            photo_status: None,
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

    pub fn has_photo(&self) -> bool {
        self.photo_storage_id.is_some()
    }

    pub fn has_pending_photo(&self) -> bool {
        self.photo_status == Some(PhotoStatus::Pending)
    }
}

impl SyncRecord for DailyChore {
    const TABLE: Table = Table::DailyChores;

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

    fn scope(&self) -> Option<String> {
        Some(self.date.clone())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn daily_chore(id: &str, date: &str, last_modified: i64) -> DailyChore {
        DailyChore {
            id: ClientId::new(id.to_string()).unwrap(),
            date: date.to_string(),
            master_chore_id: Some("master-1".into()),
            text: format!("Chore {id}"),
            description: None,
            time_slot: TimeSlot::Morning,
            animal_category: "poultry".into(),
            sort_order: 1,
            is_completed: false,
            completed_at: None,
            completed_by: None,
            is_ad_hoc: false,
            requires_photo: false,
            photo_storage_id: None,
            thumbnail_storage_id: None,
            photo_captured_at: None,
            photo_captured_by: None,
            photo_status: None,
            sync_status: SyncStatus::Synced,
            last_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_is_the_list_date() {
        let chore = fixtures::daily_chore("d-1", "2025-05-01", 10);
        assert_eq!(chore.scope().as_deref(), Some("2025-05-01"));
    }

    #[test]
    fn server_documents_fill_local_defaults() {
        let doc = json!({
            "_id": "j9x",
            "clientId": "d-2",
            "date": "2025-05-01",
            "text": "Collect eggs",
            "timeSlot": "morning",
            "animalCategory": "poultry",
            "sortOrder": 3,
            "isCompleted": false,
            "requiresPhoto": true,
            "photoStorageId": "kg2storage",
            "lastModified": 42
        });
        let chore: DailyChore = serde_json::from_value(doc).unwrap();
        assert_eq!(chore.sync_status, SyncStatus::Synced);
        assert!(chore.has_photo());
        assert!(!chore.is_ad_hoc);
        assert_eq!(chore.photo_status, None);
    }

    #[test]
    fn ad_hoc_chores_start_pending_without_photo_requirement() {
        let input = NewAdHocChore {
            text: "Fix fence".into(),
            time_slot: TimeSlot::Afternoon,
            animal_category: "general".into(),
            created_by: None,
        };
        let chore =
            DailyChore::ad_hoc(ClientId::generate(), "2025-05-01".into(), &input, 4, 7).unwrap();
        assert!(chore.is_ad_hoc);
        assert!(!chore.requires_photo);
        assert_eq!(chore.sync_status, SyncStatus::Pending);
        assert_eq!(chore.sort_order, 4);
    }
}
