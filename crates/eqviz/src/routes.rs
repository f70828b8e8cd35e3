use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use eqviz_core::datasets::{
    self, Dashboard, DatasetAnalytics, DatasetDetail, DatasetEquipment, UploadOutcome,
    UploadRequest,
};
use eqviz_core::repository::{DatasetInfo, EquipmentFilter, EquipmentItem};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Listing<T> {
    pub count: usize,
    pub results: Vec<T>,
}

impl<T> From<Vec<T>> for Listing<T> {
    fn from(results: Vec<T>) -> Self {
        Self {
            count: results.len(),
            results,
        }
    }
}

/// `POST /api/datasets/upload` with multipart fields `file` and optional `name`.
pub async fn upload_dataset(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut name = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.body_text()))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let contents = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.body_text()))?;
                file = Some((file_name, contents.to_vec()));
            }
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.body_text()))?;
                name = Some(text);
            }
            _ => {}
        }
    }

    let Some((file_name, contents)) = file else {
        return Ok(rejected(vec!["No file was submitted.".to_string()], Vec::new()));
    };

    let request = UploadRequest {
        name,
        file_name,
        contents,
    };
    let outcome =
        datasets::upload_dataset(state.repository(), &state.limits(), user.id, request).await;

    match outcome {
        Ok(UploadOutcome::Created {
            dataset, warnings, ..
        }) => {
            let body = json!({
                "success": true,
                "message": format!("Successfully uploaded {} equipment records", dataset.row_count),
                "dataset_id": dataset.id,
                "dataset": dataset,
                "warnings": warnings,
            });
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
        Ok(UploadOutcome::Rejected { errors, warnings }) => Ok(rejected(errors, warnings)),
        Err(err) => {
            error!("failed to store uploaded dataset: {err}");
            let body = json!({
                "success": false,
                "errors": [format!("Error processing file: {err}")],
            });
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
        }
    }
}

fn rejected(errors: Vec<String>, warnings: Vec<String>) -> Response {
    let body = json!({
        "success": false,
        "errors": errors,
        "warnings": warnings,
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

pub async fn list_datasets(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Listing<DatasetInfo>>, ApiError> {
    let datasets = datasets::list_datasets(state.repository(), user.id).await?;
    Ok(Json(datasets.into()))
}

pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(datasets::dashboard(state.repository(), user.id).await?))
}

pub async fn dataset_detail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DatasetDetail>, ApiError> {
    Ok(Json(
        datasets::dataset_detail(state.repository(), user.id, id).await?,
    ))
}

pub async fn delete_dataset(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    datasets::delete_dataset(state.repository(), user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dataset_analytics(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DatasetAnalytics>, ApiError> {
    Ok(Json(
        datasets::dataset_analytics(state.repository(), user.id, id).await?,
    ))
}

pub async fn dataset_equipment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DatasetEquipment>, ApiError> {
    Ok(Json(
        datasets::dataset_equipment(state.repository(), user.id, id).await?,
    ))
}

pub async fn dataset_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let report = datasets::dataset_report(state.repository(), user.id, id).await?;
    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"equipment_report_{id}.txt\""),
        ),
    ];
    Ok((headers, report).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct EquipmentQuery {
    pub dataset: Option<String>,
    #[serde(rename = "type")]
    pub equipment_type: Option<String>,
}

impl EquipmentQuery {
    fn into_filter(self) -> Result<EquipmentFilter, ApiError> {
        let dataset_id = match self.dataset.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                ApiError::BadRequest(format!("'{raw}' is not a valid dataset id."))
            })?),
        };
        let equipment_type = self
            .equipment_type
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(EquipmentFilter {
            dataset_id,
            equipment_type,
        })
    }
}

/// `GET /api/equipment?dataset=<id>&type=<name>`; the type match ignores case.
pub async fn list_equipment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<EquipmentQuery>,
) -> Result<Json<Listing<EquipmentItem>>, ApiError> {
    let filter = query.into_filter()?;
    let items = datasets::list_equipment(state.repository(), user.id, &filter).await?;
    Ok(Json(items.into()))
}

pub async fn get_equipment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<EquipmentItem>, ApiError> {
    Ok(Json(
        datasets::get_equipment(state.repository(), user.id, id).await?,
    ))
}
