use chrono::{DateTime, Utc};
use eqviz_parser::{CsvIngestor, EquipmentRecord};
use serde::Serialize;
use tracing::{info, warn};

use crate::analytics::{self, AnalysisSnapshot, ChartView, SummaryView};
use crate::config::UploadLimits;
use crate::error::Result;
use crate::report;
use crate::repository::{
    DatasetInfo, EquipmentFilter, EquipmentItem, NewDataset, Repository, StoredAnalysis,
};

pub const MAX_DATASET_NAME_LEN: usize = 255;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Custom dataset name; defaults to the file name.
    pub name: Option<String>,
    pub file_name: String,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The upload failed validation or ingestion; nothing was stored.
    Rejected {
        errors: Vec<String>,
        warnings: Vec<String>,
    },
    Created {
        dataset: DatasetInfo,
        warnings: Vec<String>,
        evicted: Vec<i64>,
    },
}

/// Checks an upload before its contents are parsed.
pub fn validate_upload(request: &UploadRequest, limits: &UploadLimits) -> Vec<String> {
    let mut errors = Vec::new();

    if !request.file_name.ends_with(".csv") {
        errors.push("Only CSV files are allowed.".to_string());
    }
    if request.contents.len() > limits.max_upload_bytes {
        errors.push(format!(
            "File size must be less than {}MB.",
            limits.max_upload_bytes / (1024 * 1024)
        ));
    }
    if let Some(name) = &request.name {
        if name.chars().count() > MAX_DATASET_NAME_LEN {
            errors.push(format!(
                "Ensure this field has no more than {MAX_DATASET_NAME_LEN} characters."
            ));
        }
    }

    errors
}

/// Validates, parses and stores an uploaded file for `owner_id`.
///
/// The dataset, its rows and snapshot are committed together; older datasets
/// of the owner beyond the retention cap are evicted in the same step.
pub async fn upload_dataset<R>(
    repo: &R,
    limits: &UploadLimits,
    owner_id: i64,
    request: UploadRequest,
) -> Result<UploadOutcome>
where
    R: Repository + ?Sized,
{
    let errors = validate_upload(&request, limits);
    if !errors.is_empty() {
        warn!(owner_id, file_name = %request.file_name, ?errors, "upload rejected");
        return Ok(UploadOutcome::Rejected {
            errors,
            warnings: Vec::new(),
        });
    }

    let mut ingestor = CsvIngestor::new();
    let (records, success) = ingestor.parse(&request.contents);
    let warnings = ingestor.warnings().to_vec();
    if !success {
        let errors = ingestor.errors().to_vec();
        warn!(owner_id, file_name = %request.file_name, ?errors, "upload rejected");
        return Ok(UploadOutcome::Rejected { errors, warnings });
    }

    let snapshot = analytics::compute(&records);
    let name = request
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| request.file_name.clone());

    let created = repo
        .create_dataset(
            NewDataset {
                owner_id,
                name,
                file_hash: blake3::hash(&request.contents).to_hex().to_string(),
                file_size: request.contents.len() as i64,
                file_name: request.file_name,
                uploaded_at: Utc::now(),
                records,
                snapshot,
            },
            limits.max_datasets_per_user,
        )
        .await?;

    info!(
        owner_id,
        dataset_id = created.dataset.id,
        name = %created.dataset.name,
        rows = created.dataset.row_count,
        "dataset uploaded"
    );

    Ok(UploadOutcome::Created {
        dataset: created.dataset,
        warnings,
        evicted: created.evicted,
    })
}

pub async fn list_datasets<R>(repo: &R, owner_id: i64) -> Result<Vec<DatasetInfo>>
where
    R: Repository + ?Sized,
{
    repo.list_datasets(owner_id).await
}

pub async fn delete_dataset<R>(repo: &R, owner_id: i64, dataset_id: i64) -> Result<()>
where
    R: Repository + ?Sized,
{
    repo.delete_dataset(owner_id, dataset_id).await?;
    info!(owner_id, dataset_id, "dataset deleted");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetDetail {
    #[serde(flatten)]
    pub dataset: DatasetInfo,
    pub equipment_items: Vec<EquipmentItem>,
    pub analysis: Option<StoredAnalysis>,
}

pub async fn dataset_detail<R>(repo: &R, owner_id: i64, dataset_id: i64) -> Result<DatasetDetail>
where
    R: Repository + ?Sized,
{
    let dataset = repo.get_dataset(owner_id, dataset_id).await?;
    let equipment_items = repo
        .list_equipment(owner_id, &EquipmentFilter::for_dataset(dataset_id))
        .await?;
    let analysis = repo.fetch_analysis(dataset_id).await?;

    Ok(DatasetDetail {
        dataset,
        equipment_items,
        analysis,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetEquipment {
    pub dataset_id: i64,
    pub dataset_name: String,
    pub count: usize,
    pub equipment: Vec<EquipmentItem>,
}

pub async fn dataset_equipment<R>(
    repo: &R,
    owner_id: i64,
    dataset_id: i64,
) -> Result<DatasetEquipment>
where
    R: Repository + ?Sized,
{
    let dataset = repo.get_dataset(owner_id, dataset_id).await?;
    let equipment = repo
        .list_equipment(owner_id, &EquipmentFilter::for_dataset(dataset_id))
        .await?;

    Ok(DatasetEquipment {
        dataset_id: dataset.id,
        dataset_name: dataset.name,
        count: equipment.len(),
        equipment,
    })
}

pub async fn list_equipment<R>(
    repo: &R,
    owner_id: i64,
    filter: &EquipmentFilter,
) -> Result<Vec<EquipmentItem>>
where
    R: Repository + ?Sized,
{
    repo.list_equipment(owner_id, filter).await
}

pub async fn get_equipment<R>(repo: &R, owner_id: i64, equipment_id: i64) -> Result<EquipmentItem>
where
    R: Repository + ?Sized,
{
    repo.get_equipment(owner_id, equipment_id).await
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetAnalytics {
    pub dataset_id: i64,
    pub dataset_name: String,
    pub summary: SummaryView,
    pub chart_data: ChartView,
    /// `None` when the snapshot was recomputed from stored rows.
    pub computed_at: Option<DateTime<Utc>>,
}

pub async fn dataset_analytics<R>(
    repo: &R,
    owner_id: i64,
    dataset_id: i64,
) -> Result<DatasetAnalytics>
where
    R: Repository + ?Sized,
{
    let dataset = repo.get_dataset(owner_id, dataset_id).await?;
    let (snapshot, computed_at) = load_snapshot(repo, &dataset).await?;

    Ok(DatasetAnalytics {
        dataset_id: dataset.id,
        dataset_name: dataset.name,
        summary: analytics::summary_view(&snapshot),
        chart_data: analytics::chart_view(&snapshot),
        computed_at,
    })
}

/// Combined analytics over every dataset of one owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub success: bool,
    pub datasets_count: usize,
    pub total_equipment: usize,
    pub summary: Option<SummaryView>,
    pub chart_data: Option<ChartView>,
}

pub async fn dashboard<R>(repo: &R, owner_id: i64) -> Result<Dashboard>
where
    R: Repository + ?Sized,
{
    let datasets = repo.list_datasets(owner_id).await?;
    let items = if datasets.is_empty() {
        Vec::new()
    } else {
        repo.list_equipment(owner_id, &EquipmentFilter::default())
            .await?
    };

    let (summary, chart_data) = if items.is_empty() {
        (None, None)
    } else {
        let records: Vec<EquipmentRecord> = items.into_iter().map(|item| item.record).collect();
        let snapshot = analytics::compute(&records);
        (
            Some(analytics::summary_view(&snapshot)),
            Some(analytics::chart_view(&snapshot)),
        )
    };

    Ok(Dashboard {
        success: true,
        datasets_count: datasets.len(),
        total_equipment: summary.as_ref().map_or(0, |summary| summary.total_count),
        summary,
        chart_data,
    })
}

/// Renders the plain-text report of one dataset.
pub async fn dataset_report<R>(repo: &R, owner_id: i64, dataset_id: i64) -> Result<String>
where
    R: Repository + ?Sized,
{
    let dataset = repo.get_dataset(owner_id, dataset_id).await?;
    let (snapshot, _) = load_snapshot(repo, &dataset).await?;
    let records: Vec<EquipmentRecord> = repo
        .list_equipment(owner_id, &EquipmentFilter::for_dataset(dataset_id))
        .await?
        .into_iter()
        .map(|item| item.record)
        .collect();

    Ok(report::render_report(
        &dataset.name,
        dataset.uploaded_at,
        Utc::now(),
        &snapshot,
        &records,
    ))
}

/// The stored snapshot, or one recomputed from the dataset's rows.
async fn load_snapshot<R>(
    repo: &R,
    dataset: &DatasetInfo,
) -> Result<(AnalysisSnapshot, Option<DateTime<Utc>>)>
where
    R: Repository + ?Sized,
{
    if let Some(stored) = repo.fetch_analysis(dataset.id).await? {
        return Ok((stored.snapshot, Some(stored.computed_at)));
    }

    let records: Vec<EquipmentRecord> = repo
        .list_equipment(dataset.owner_id, &EquipmentFilter::for_dataset(dataset.id))
        .await?
        .into_iter()
        .map(|item| item.record)
        .collect();
    Ok((analytics::compute(&records), None))
}
