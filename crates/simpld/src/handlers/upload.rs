//! Dataset upload.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use simpl_core::store_upload;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying the dataset.
const FILE_FIELD: &str = "file";

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Path to pass back as `dataset_id` when triggering a run.
    pub dataset_id: String,
    pub detected_columns: Vec<String>,
}

pub async fn upload_dataset(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|r| ApiError::Unprocessable(r.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let upload_dir = state.upload_dir.clone();
        let stored =
            tokio::task::spawn_blocking(move || store_upload(&upload_dir, &filename, &bytes))
                .await
                .map_err(ApiError::internal)??;

        info!(
            path = %stored.path.display(),
            columns = stored.columns.len(),
            "dataset uploaded"
        );
        return Ok(Json(UploadResponse {
            dataset_id: stored.path.display().to_string(),
            detected_columns: stored.columns,
        }));
    }

    Err(ApiError::Unprocessable(format!(
        "missing multipart field {FILE_FIELD:?}"
    )))
}
