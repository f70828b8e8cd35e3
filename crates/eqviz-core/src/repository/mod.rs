use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eqviz_parser::EquipmentRecord;
use serde::{Deserialize, Serialize};

use crate::analytics::AnalysisSnapshot;
use crate::error::Result;
use crate::users::User;

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub token_hash: String,
}

/// A dataset about to be stored together with its rows and snapshot.
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub owner_id: i64,
    pub name: String,
    pub file_name: String,
    pub file_hash: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
    pub records: Vec<EquipmentRecord>,
    pub snapshot: AnalysisSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub id: i64,
    pub name: String,
    #[serde(rename = "uploaded_by")]
    pub owner_id: i64,
    #[serde(rename = "uploaded_by_username")]
    pub owner_username: String,
    #[serde(skip_serializing)]
    pub file_name: String,
    #[serde(skip_serializing)]
    pub file_hash: String,
    #[serde(skip_serializing)]
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
    pub row_count: i64,
    pub has_analysis: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedDataset {
    pub dataset: DatasetInfo,
    /// Ids of older datasets of the same owner removed to honour the retention cap.
    pub evicted: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnalysis {
    #[serde(flatten)]
    pub snapshot: AnalysisSnapshot,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentItem {
    pub id: i64,
    #[serde(skip_serializing)]
    pub dataset_id: i64,
    #[serde(flatten)]
    pub record: EquipmentRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquipmentFilter {
    pub dataset_id: Option<i64>,
    /// Matched case-insensitively.
    pub equipment_type: Option<String>,
}

impl EquipmentFilter {
    pub fn for_dataset(dataset_id: i64) -> Self {
        Self {
            dataset_id: Some(dataset_id),
            equipment_type: None,
        }
    }
}

/// Storage seam shared by the HTTP layer and the CLI.
///
/// Lookups are scoped to an owner: a dataset or row that belongs to someone
/// else is reported as [`CoreError::NotFound`](crate::CoreError::NotFound).
#[async_trait]
pub trait Repository: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn find_user_by_token(&self, token_hash: &str) -> Result<Option<User>>;

    /// Stores the dataset, its rows and snapshot atomically, then evicts the
    /// owner's oldest datasets beyond `max_per_owner`.
    async fn create_dataset(
        &self,
        dataset: NewDataset,
        max_per_owner: usize,
    ) -> Result<CreatedDataset>;

    /// Newest first.
    async fn list_datasets(&self, owner_id: i64) -> Result<Vec<DatasetInfo>>;

    async fn get_dataset(&self, owner_id: i64, dataset_id: i64) -> Result<DatasetInfo>;

    async fn delete_dataset(&self, owner_id: i64, dataset_id: i64) -> Result<()>;

    async fn fetch_analysis(&self, dataset_id: i64) -> Result<Option<StoredAnalysis>>;

    /// Ordered by name, then id.
    async fn list_equipment(
        &self,
        owner_id: i64,
        filter: &EquipmentFilter,
    ) -> Result<Vec<EquipmentItem>>;

    async fn get_equipment(&self, owner_id: i64, equipment_id: i64) -> Result<EquipmentItem>;
}
