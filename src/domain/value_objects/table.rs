use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity tables replicated between the device and the remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    #[serde(rename = "chores")]
    Chores,
    #[serde(rename = "dailyChores")]
    DailyChores,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Chores, Table::DailyChores];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Chores => "chores",
            Table::DailyChores => "dailyChores",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "chores" => Some(Table::Chores),
            "dailyChores" => Some(Table::DailyChores),
            _ => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "create" => Some(MutationKind::Create),
            "update" => Some(MutationKind::Update),
            "delete" => Some(MutationKind::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
