use crate::domain::entities::SyncRecord;
use crate::domain::value_objects::{ClientId, SyncStatus};
use std::collections::{HashMap, HashSet};

/// Whether a server snapshot lists every record of its scope or only recent changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Complete,
    Delta,
}

/// Writes required to fold a server snapshot into local state.
#[derive(Debug, Clone)]
pub struct MergeOutcome<T> {
    pub upserts: Vec<T>,
    pub removed: Vec<ClientId>,
}

impl<T> MergeOutcome<T> {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removed.is_empty()
    }
}

impl<T> Default for MergeOutcome<T> {
    fn default() -> Self {
        Self {
            upserts: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// Last-write-wins merge of `server` into `local`.
///
/// `local` holds the records of the snapshot's scope. Pending local deletes hide
/// server copies, pending local edits always survive, and synced or failed copies
/// are replaced only by strictly newer server copies. Synced records missing from
/// a complete snapshot were deleted remotely.
pub fn merge_snapshot<T: SyncRecord>(
    local: &[T],
    server: Vec<T>,
    pending_deletes: &HashSet<ClientId>,
    kind: SnapshotKind,
) -> MergeOutcome<T> {
    let by_id: HashMap<&ClientId, &T> = local.iter().map(|r| (r.client_id(), r)).collect();
    let mut seen: HashSet<ClientId> = HashSet::with_capacity(server.len());
    let mut staged: HashMap<ClientId, T> = HashMap::new();

    for mut incoming in server {
        let id = incoming.client_id().clone();
        seen.insert(id.clone());

        if pending_deletes.contains(&id) {
            continue;
        }

        // A duplicate in the same snapshot competes with the copy already staged.
        let current = staged.get(&id).or_else(|| by_id.get(&id).copied());
        let accept = match current {
            None => true,
            Some(existing) => match existing.sync_status() {
                SyncStatus::Pending => false,
                SyncStatus::Synced | SyncStatus::Failed => {
                    incoming.last_modified() > existing.last_modified()
                }
            },
        };

        if accept {
            incoming.set_sync_status(SyncStatus::Synced);
            staged.insert(id, incoming);
        }
    }

    let mut removed = Vec::new();
    if kind == SnapshotKind::Complete {
        for record in local {
            if record.sync_status() == SyncStatus::Synced && !seen.contains(record.client_id()) {
                removed.push(record.client_id().clone());
            }
        }
    }

    let mut upserts: Vec<T> = staged.into_values().collect();
    upserts.sort_by(|a, b| a.client_id().cmp(b.client_id()));
    removed.sort();

    MergeOutcome { upserts, removed }
}
