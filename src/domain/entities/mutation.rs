use super::{Chore, DailyChore};
use crate::domain::value_objects::{ClientId, MutationId, MutationKind, Table, TimeSlot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Arguments of the remote `chores.create` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChoreArgs {
    pub client_id: ClientId,
    pub text: String,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    pub last_modified: i64,
}

impl From<&Chore> for CreateChoreArgs {
    fn from(chore: &Chore) -> Self {
        Self {
            client_id: chore.id.clone(),
            text: chore.text.clone(),
            is_completed: chore.is_completed,
            completed_at: chore.completed_at,
            completed_by: chore.completed_by.clone(),
            last_modified: chore.last_modified,
        }
    }
}

/// Arguments of the remote `chores.update` operation. Absent fields are left untouched,
/// except that `is_completed = false` clears the completion attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChoreArgs {
    pub client_id: ClientId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    pub last_modified: i64,
}

impl From<&Chore> for UpdateChoreArgs {
    fn from(chore: &Chore) -> Self {
        Self {
            client_id: chore.id.clone(),
            text: Some(chore.text.clone()),
            is_completed: Some(chore.is_completed),
            completed_at: chore.completed_at,
            completed_by: chore.completed_by.clone(),
            last_modified: chore.last_modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveArgs {
    pub client_id: ClientId,
}

/// Arguments of the remote `dailyChores.addAdHoc` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAdHocArgs {
    pub client_id: ClientId,
    pub date: String,
    pub text: String,
    pub time_slot: TimeSlot,
    pub animal_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub last_modified: i64,
}

impl From<&DailyChore> for AddAdHocArgs {
    fn from(chore: &DailyChore) -> Self {
        Self {
            client_id: chore.id.clone(),
            date: chore.date.clone(),
            text: chore.text.clone(),
            time_slot: chore.time_slot,
            animal_category: chore.animal_category.clone(),
            created_by: None,
            last_modified: chore.last_modified,
        }
    }
}

/// Arguments of the remote `dailyChores.toggleComplete` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDailyChoreArgs {
    pub client_id: ClientId,
    pub is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    pub last_modified: i64,
}

impl From<&DailyChore> for UpdateDailyChoreArgs {
    fn from(chore: &DailyChore) -> Self {
        Self {
            client_id: chore.id.clone(),
            is_completed: chore.is_completed,
            completed_at: chore.completed_at,
            completed_by: chore.completed_by.clone(),
            last_modified: chore.last_modified,
        }
    }
}

/// Typed arguments of a queued remote operation, one variant per operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "camelCase")]
pub enum MutationPayload {
    CreateChore(CreateChoreArgs),
    UpdateChore(UpdateChoreArgs),
    RemoveChore(RemoveArgs),
    CreateDailyChore(AddAdHocArgs),
    UpdateDailyChore(UpdateDailyChoreArgs),
    RemoveDailyChore(RemoveArgs),
}

impl MutationPayload {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::CreateChore(_) | Self::CreateDailyChore(_) => MutationKind::Create,
            Self::UpdateChore(_) | Self::UpdateDailyChore(_) => MutationKind::Update,
            Self::RemoveChore(_) | Self::RemoveDailyChore(_) => MutationKind::Delete,
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Self::CreateChore(_) | Self::UpdateChore(_) | Self::RemoveChore(_) => Table::Chores,
            Self::CreateDailyChore(_) | Self::UpdateDailyChore(_) | Self::RemoveDailyChore(_) => {
                Table::DailyChores
            }
        }
    }

    pub fn client_id(&self) -> &ClientId {
        match self {
            Self::CreateChore(args) => &args.client_id,
            Self::UpdateChore(args) => &args.client_id,
            Self::RemoveChore(args) | Self::RemoveDailyChore(args) => &args.client_id,
            Self::CreateDailyChore(args) => &args.client_id,
            Self::UpdateDailyChore(args) => &args.client_id,
        }
    }

    /// Timestamp of the local write this payload carries; deletes carry none.
    pub fn last_modified(&self) -> Option<i64> {
        match self {
            Self::CreateChore(args) => Some(args.last_modified),
            Self::UpdateChore(args) => Some(args.last_modified),
            Self::CreateDailyChore(args) => Some(args.last_modified),
            Self::UpdateDailyChore(args) => Some(args.last_modified),
            Self::RemoveChore(_) | Self::RemoveDailyChore(_) => None,
        }
    }

    /// Operation arguments as sent to the remote backend.
    pub fn to_args(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::CreateChore(args) => serde_json::to_value(args),
            Self::UpdateChore(args) => serde_json::to_value(args),
            Self::RemoveChore(args) | Self::RemoveDailyChore(args) => serde_json::to_value(args),
            Self::CreateDailyChore(args) => serde_json::to_value(args),
            Self::UpdateDailyChore(args) => serde_json::to_value(args),
        }
    }
}

/// Durable intent to apply one remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub id: MutationId,
    pub kind: MutationKind,
    pub table: Table,
    pub payload: MutationPayload,
    pub created_at: i64,
    pub retry_count: u32,
    pub failed_at: Option<i64>,
}

impl Mutation {
    pub fn new(
        kind: MutationKind,
        table: Table,
        payload: MutationPayload,
        created_at: i64,
    ) -> Result<Self, String> {
        if payload.kind() != kind || payload.table() != table {
            return Err(format!(
                "Payload {}/{} does not match mutation {}/{}",
                payload.table(),
                payload.kind(),
                table,
                kind
            ));
        }
        Ok(Self {
            id: MutationId::generate(),
            kind,
            table,
            payload,
            created_at,
            retry_count: 0,
            failed_at: None,
        })
    }

    pub fn target_id(&self) -> &ClientId {
        self.payload.client_id()
    }

    pub fn is_failed(&self) -> bool {
        self.failed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update_args(id: &str) -> UpdateChoreArgs {
        UpdateChoreArgs {
            client_id: ClientId::new(id.into()).unwrap(),
            text: None,
            is_completed: Some(true),
            completed_at: None,
            completed_by: Some("Ana".into()),
            last_modified: 100,
        }
    }

    #[test]
    fn payload_must_match_kind_and_table() {
        let payload = MutationPayload::UpdateChore(update_args("c-1"));
        assert!(Mutation::new(MutationKind::Update, Table::Chores, payload.clone(), 1).is_ok());
        assert!(Mutation::new(MutationKind::Create, Table::Chores, payload.clone(), 1).is_err());
        assert!(Mutation::new(MutationKind::Update, Table::DailyChores, payload, 1).is_err());
    }

    #[test]
    fn args_omit_absent_fields() {
        let payload = MutationPayload::UpdateChore(update_args("c-1"));
        let args = payload.to_args().unwrap();
        assert_eq!(
            args,
            json!({
                "clientId": "c-1",
                "isCompleted": true,
                "completedBy": "Ana",
                "lastModified": 100
            })
        );
    }

    #[test]
    fn deletes_carry_no_timestamp() {
        let payload = MutationPayload::RemoveDailyChore(RemoveArgs {
            client_id: ClientId::new("d-1".into()).unwrap(),
        });
        assert_eq!(payload.kind(), MutationKind::Delete);
        assert_eq!(payload.table(), Table::DailyChores);
        assert_eq!(payload.last_modified(), None);
    }
}
