use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use eqviz_parser::EquipmentRecord;
use tokio::sync::Mutex;
use tracing::info;

use super::{
    CreatedDataset, DatasetInfo, EquipmentFilter, EquipmentItem, NewDataset, NewUser, Repository,
    StoredAnalysis,
};
use crate::error::{CoreError, Result};
use crate::users::User;

/// Process-local store with the same semantics as [`PostgresRepository`](super::PostgresRepository).
///
/// Everything lives behind one mutex, so each operation is atomic.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_user_id: i64,
    next_dataset_id: i64,
    next_equipment_id: i64,
    users: Vec<(User, String)>,
    datasets: BTreeMap<i64, StoredDataset>,
}

struct StoredDataset {
    info: DatasetInfo,
    equipment: Vec<(i64, EquipmentRecord)>,
    analysis: Option<StoredAnalysis>,
}

impl StoredDataset {
    fn info(&self) -> DatasetInfo {
        DatasetInfo {
            has_analysis: self.analysis.is_some(),
            ..self.info.clone()
        }
    }

    fn items(&self) -> impl Iterator<Item = EquipmentItem> + '_ {
        self.equipment.iter().map(|(id, record)| EquipmentItem {
            id: *id,
            dataset_id: self.info.id,
            record: record.clone(),
        })
    }
}

impl State {
    fn owned(&self, owner_id: i64) -> impl Iterator<Item = &StoredDataset> {
        self.datasets
            .values()
            .filter(move |stored| stored.info.owner_id == owner_id)
    }

    /// Owner's dataset ids, newest first.
    fn owned_newest_first(&self, owner_id: i64) -> Vec<i64> {
        let mut owned: Vec<&DatasetInfo> = self.owned(owner_id).map(|s| &s.info).collect();
        owned.sort_by(|a, b| (b.uploaded_at, b.id).cmp(&(a.uploaded_at, a.id)));
        owned.into_iter().map(|info| info.id).collect()
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the stored snapshot of a dataset, as if it had never been computed.
    pub async fn discard_analysis(&self, dataset_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        let stored = state
            .datasets
            .get_mut(&dataset_id)
            .ok_or_else(|| CoreError::dataset_not_found(dataset_id))?;
        stored.analysis = None;
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.lock().await;
        if state
            .users
            .iter()
            .any(|(existing, _)| existing.username == user.username)
        {
            return Err(CoreError::UsernameTaken(user.username));
        }

        state.next_user_id += 1;
        let created = User {
            id: state.next_user_id,
            username: user.username,
            created_at: Utc::now(),
        };
        state.users.push((created.clone(), user.token_hash));
        Ok(created)
    }

    async fn find_user_by_token(&self, token_hash: &str) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|(_, hash)| hash == token_hash)
            .map(|(user, _)| user.clone()))
    }

    async fn create_dataset(
        &self,
        dataset: NewDataset,
        max_per_owner: usize,
    ) -> Result<CreatedDataset> {
        let mut state = self.state.lock().await;

        let owner_username = state
            .users
            .iter()
            .find(|(user, _)| user.id == dataset.owner_id)
            .map(|(user, _)| user.username.clone())
            .unwrap_or_default();

        state.next_dataset_id += 1;
        let dataset_id = state.next_dataset_id;

        let mut equipment = Vec::with_capacity(dataset.records.len());
        for record in dataset.records {
            state.next_equipment_id += 1;
            equipment.push((state.next_equipment_id, record));
        }

        let info = DatasetInfo {
            id: dataset_id,
            name: dataset.name,
            owner_id: dataset.owner_id,
            owner_username,
            file_name: dataset.file_name,
            file_hash: dataset.file_hash,
            file_size: dataset.file_size,
            uploaded_at: dataset.uploaded_at,
            row_count: equipment.len() as i64,
            has_analysis: true,
        };
        state.datasets.insert(
            dataset_id,
            StoredDataset {
                info: info.clone(),
                equipment,
                analysis: Some(StoredAnalysis {
                    snapshot: dataset.snapshot,
                    computed_at: Utc::now(),
                }),
            },
        );

        let evicted: Vec<i64> = state
            .owned_newest_first(dataset.owner_id)
            .into_iter()
            .skip(max_per_owner)
            .collect();
        for id in &evicted {
            state.datasets.remove(id);
        }

        if !evicted.is_empty() {
            info!(
                owner_id = dataset.owner_id,
                evicted = ?evicted,
                "evicted datasets beyond retention cap"
            );
        }

        Ok(CreatedDataset {
            dataset: info,
            evicted,
        })
    }

    async fn list_datasets(&self, owner_id: i64) -> Result<Vec<DatasetInfo>> {
        let state = self.state.lock().await;
        Ok(state
            .owned_newest_first(owner_id)
            .into_iter()
            .filter_map(|id| state.datasets.get(&id).map(StoredDataset::info))
            .collect())
    }

    async fn get_dataset(&self, owner_id: i64, dataset_id: i64) -> Result<DatasetInfo> {
        let state = self.state.lock().await;
        state
            .datasets
            .get(&dataset_id)
            .filter(|stored| stored.info.owner_id == owner_id)
            .map(StoredDataset::info)
            .ok_or_else(|| CoreError::dataset_not_found(dataset_id))
    }

    async fn delete_dataset(&self, owner_id: i64, dataset_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        let owned = state
            .datasets
            .get(&dataset_id)
            .is_some_and(|stored| stored.info.owner_id == owner_id);
        if !owned {
            return Err(CoreError::dataset_not_found(dataset_id));
        }
        state.datasets.remove(&dataset_id);
        Ok(())
    }

    async fn fetch_analysis(&self, dataset_id: i64) -> Result<Option<StoredAnalysis>> {
        let state = self.state.lock().await;
        Ok(state
            .datasets
            .get(&dataset_id)
            .and_then(|stored| stored.analysis.clone()))
    }

    async fn list_equipment(
        &self,
        owner_id: i64,
        filter: &EquipmentFilter,
    ) -> Result<Vec<EquipmentItem>> {
        let state = self.state.lock().await;
        let wanted_type = filter.equipment_type.as_deref().map(str::to_lowercase);

        let mut items: Vec<EquipmentItem> = state
            .owned(owner_id)
            .filter(|stored| filter.dataset_id.map_or(true, |id| stored.info.id == id))
            .flat_map(StoredDataset::items)
            .filter(|item| {
                wanted_type
                    .as_deref()
                    .map_or(true, |wanted| item.record.equipment_type.to_lowercase() == wanted)
            })
            .collect();
        items.sort_by(|a, b| a.record.name.cmp(&b.record.name).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn get_equipment(&self, owner_id: i64, equipment_id: i64) -> Result<EquipmentItem> {
        let state = self.state.lock().await;
        let found = state
            .owned(owner_id)
            .flat_map(StoredDataset::items)
            .find(|item| item.id == equipment_id)
            .ok_or_else(|| CoreError::equipment_not_found(equipment_id));
        found
    }
}
