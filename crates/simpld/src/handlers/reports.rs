use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use simpl_core::{run_rows, RowPage, DEFAULT_PAGE_SIZE};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn first_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE as i64
}

fn at_least_one(name: &str, value: i64) -> Result<usize, ApiError> {
    usize::try_from(value)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| ApiError::Unprocessable(format!("{name} must be at least 1")))
}

/// One page of a run's row-level results.
pub async fn run_rows_page(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<RowPage>, ApiError> {
    let Path(run_id) = id?;
    let Query(query) = query?;
    let page = at_least_one("page", query.page)?;
    let page_size = at_least_one("page_size", query.page_size)?;
    Ok(Json(
        run_rows(state.store.as_ref(), run_id, page, page_size).await?,
    ))
}
