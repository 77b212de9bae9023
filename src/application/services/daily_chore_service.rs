use super::mutation_queue::MutationQueue;
use super::photo_queue::PhotoQueue;
use super::record_store::RecordStore;
use crate::domain::entities::{
    AddAdHocArgs, CapturedPhoto, DailyChore, MutationPayload, NewAdHocChore, PhotoQueueEntry,
    RemoveArgs, UpdateDailyChoreArgs,
};
use crate::domain::value_objects::{
    ClientId, MutationKind, PhotoId, PhotoStatus, Table, TimeSlot, effective_date, format_date,
    parse_date,
};
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub name: String,
    pub chores: Vec<DailyChore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotGroup {
    pub time_slot: TimeSlot,
    pub categories: Vec<CategoryGroup>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyProgress {
    pub completed: usize,
    pub total: usize,
    /// Rounded to the nearest whole percent; 0 for an empty list.
    pub percent: u8,
}

/// Optimistic edits of a day's chore list, including photo-backed completion.
pub struct DailyChoreService {
    store: Arc<RecordStore<DailyChore>>,
    mutations: Arc<MutationQueue>,
    photos: Arc<PhotoQueue>,
    clock: Arc<dyn Clock>,
}

impl DailyChoreService {
    pub fn new(
        store: Arc<RecordStore<DailyChore>>,
        mutations: Arc<MutationQueue>,
        photos: Arc<PhotoQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            mutations,
            photos,
            clock,
        }
    }

    /// Effective date of the list in use right now (rolls over at 03:00).
    pub fn today(&self) -> String {
        format_date(effective_date(self.clock.now_local()))
    }

    pub async fn load(&self, date: &str) -> Result<Vec<DailyChore>, AppError> {
        parse_date(date).map_err(AppError::InvalidInput)?;
        let mut chores = self.store.load(Some(date)).await?;
        chores.sort_by(|a, b| {
            (a.time_slot, a.sort_order, &a.text).cmp(&(b.time_slot, b.sort_order, &b.text))
        });
        Ok(chores)
    }

    pub async fn get(&self, id: &ClientId) -> Result<Option<DailyChore>, AppError> {
        self.store.get(id).await
    }

    pub async fn toggle_complete(
        &self,
        id: &ClientId,
        completed_by: &str,
    ) -> Result<Option<DailyChore>, AppError> {
        let Some(mut chore) = self.store.get(id).await? else {
            return Ok(None);
        };
        chore.set_completed(
            !chore.is_completed,
            Some(completed_by.to_string()),
            self.clock.now_utc(),
        );
        self.save_completion(chore).await.map(Some)
    }

    /// Adds an ad-hoc chore at the end of its time slot.
    pub async fn add_ad_hoc(&self, date: &str, input: NewAdHocChore) -> Result<DailyChore, AppError> {
        parse_date(date).map_err(AppError::InvalidInput)?;
        let mut input = input;
        if input.animal_category.trim().is_empty() {
            input.animal_category = DEFAULT_CATEGORY.to_string();
        }

        let sort_order = self
            .store
            .items_in(date)
            .await
            .iter()
            .filter(|c| c.time_slot == input.time_slot)
            .map(|c| c.sort_order)
            .max()
            .unwrap_or(0)
            + 1;
        let chore = DailyChore::ad_hoc(
            ClientId::generate(),
            date.to_string(),
            &input,
            sort_order,
            self.clock.now_ms(),
        )
        .map_err(AppError::InvalidInput)?;
        let chore = self.store.put_optimistic(chore).await?;

        let mut args = AddAdHocArgs::from(&chore);
        args.created_by = input.created_by.clone();
        self.mutations
            .enqueue(
                MutationKind::Create,
                Table::DailyChores,
                MutationPayload::CreateDailyChore(args),
            )
            .await?;
        Ok(chore)
    }

    pub async fn remove(&self, id: &ClientId) -> Result<bool, AppError> {
        if self.store.get(id).await?.is_none() {
            return Ok(false);
        }
        self.mutations
            .enqueue(
                MutationKind::Delete,
                Table::DailyChores,
                MutationPayload::RemoveDailyChore(RemoveArgs {
                    client_id: id.clone(),
                }),
            )
            .await?;
        self.store.remove(id).await?;
        Ok(true)
    }

    /// Marks the chore complete with a photo pending and queues the photo.
    ///
    /// The completion syncs as a normal mutation; the photo follows on its own
    /// queue and is attached once uploaded.
    pub async fn complete_with_photo(
        &self,
        id: &ClientId,
        photo: CapturedPhoto,
    ) -> Result<PhotoQueueEntry, AppError> {
        if photo.blob.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Photo for {id} is empty"
            )));
        }
        let Some(mut chore) = self.store.get(id).await? else {
            return Err(AppError::NotFound(format!("Daily chore {id} not found")));
        };

        if !chore.is_completed {
            chore.set_completed(true, Some(photo.captured_by.clone()), self.clock.now_utc());
        }
        chore.photo_status = Some(PhotoStatus::Pending);
        self.save_completion(chore).await?;

        let photo = CapturedPhoto {
            daily_chore_id: id.clone(),
            ..photo
        };
        self.photos.enqueue(photo).await
    }

    /// Drops a queued photo and the chore's pending indicator.
    pub async fn discard_photo(&self, photo_id: &PhotoId) -> Result<bool, AppError> {
        let Some(chore_id) = self.photos.remove_entry(photo_id).await? else {
            return Ok(false);
        };
        tracing::info!(photo_id = %photo_id, daily_chore_id = %chore_id, "queued photo discarded");
        self.clear_photo_status(&chore_id).await?;
        Ok(true)
    }

    /// Local-only: clears a `pending` photo indicator after the upload gave up.
    pub async fn clear_photo_status(&self, id: &ClientId) -> Result<bool, AppError> {
        let mut cleared = false;
        self.store
            .patch_local(id, |chore| {
                if chore.photo_status == Some(PhotoStatus::Pending) {
                    chore.photo_status = None;
                    cleared = true;
                }
            })
            .await?;
        Ok(cleared)
    }

    /// Local-only: forgets a photo reference that can no longer be fetched.
    pub async fn clear_broken_photo(&self, id: &ClientId) -> Result<bool, AppError> {
        let patched = self
            .store
            .patch_local(id, |chore| {
                chore.photo_storage_id = None;
                chore.thumbnail_storage_id = None;
                chore.photo_status = None;
            })
            .await?;
        Ok(patched.is_some())
    }

    pub async fn reset_failed_to_pending(&self) -> Result<usize, AppError> {
        self.store.reset_failed_to_pending().await
    }

    /// Time slots in day order, categories by name, chores by sort order.
    pub async fn grouped(&self, date: &str) -> Vec<TimeSlotGroup> {
        let items = self.store.items_in(date).await;
        let mut groups = Vec::new();

        for time_slot in TimeSlot::ALL {
            let mut categories: BTreeMap<String, Vec<DailyChore>> = BTreeMap::new();
            for chore in items.iter().filter(|c| c.time_slot == time_slot) {
                let name = if chore.animal_category.trim().is_empty() {
                    DEFAULT_CATEGORY.to_string()
                } else {
                    chore.animal_category.clone()
                };
                categories.entry(name).or_default().push(chore.clone());
            }
            if categories.is_empty() {
                continue;
            }
            let categories = categories
                .into_iter()
                .map(|(name, mut chores)| {
                    chores.sort_by_key(|c| c.sort_order);
                    CategoryGroup { name, chores }
                })
                .collect();
            groups.push(TimeSlotGroup {
                time_slot,
                categories,
            });
        }
        groups
    }

    pub async fn progress(&self, date: &str) -> DailyProgress {
        let items = self.store.items_in(date).await;
        let total = items.len();
        let completed = items.iter().filter(|c| c.is_completed).count();
        let percent = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };
        DailyProgress {
            completed,
            total,
            percent,
        }
    }

    async fn save_completion(&self, chore: DailyChore) -> Result<DailyChore, AppError> {
        let chore = self.store.put_optimistic(chore).await?;
        self.mutations
            .enqueue(
                MutationKind::Update,
                Table::DailyChores,
                MutationPayload::UpdateDailyChore(UpdateDailyChoreArgs::from(&chore)),
            )
            .await?;
        Ok(chore)
    }
}
