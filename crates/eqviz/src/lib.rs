pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

pub use error::ApiError;
pub use state::AppState;

/// Allowance for multipart framing and the `name` field on top of the upload limit.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = state.limits().max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/api/datasets", get(routes::list_datasets))
        .route("/api/datasets/upload", post(routes::upload_dataset))
        .route("/api/datasets/dashboard", get(routes::dashboard))
        .route(
            "/api/datasets/{id}",
            get(routes::dataset_detail).delete(routes::delete_dataset),
        )
        .route("/api/datasets/{id}/analytics", get(routes::dataset_analytics))
        .route("/api/datasets/{id}/equipment", get(routes::dataset_equipment))
        .route("/api/datasets/{id}/report", get(routes::dataset_report))
        .route("/api/equipment", get(routes::list_equipment))
        .route("/api/equipment/{id}", get(routes::get_equipment))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
