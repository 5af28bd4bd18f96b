//! Scorer definitions.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use simpl_state::{NewScorer, ScorerPatch, ScorerRecord};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

fn ensure_object(configuration: &Value) -> Result<(), ApiError> {
    if configuration.is_object() {
        Ok(())
    } else {
        Err(ApiError::Unprocessable(
            "configuration must be a JSON object".into(),
        ))
    }
}

pub async fn list_scorers(State(state): State<AppState>) -> Result<Json<Vec<ScorerRecord>>, ApiError> {
    Ok(Json(state.store.list_scorers().await?))
}

pub async fn create_scorer(
    State(state): State<AppState>,
    payload: Result<Json<NewScorer>, JsonRejection>,
) -> Result<Json<ScorerRecord>, ApiError> {
    let Json(new) = payload?;
    if !new.scorer_type.is_known() {
        return Err(ApiError::Unprocessable(format!(
            "Unknown scorer type: {}",
            new.scorer_type
        )));
    }
    ensure_object(&new.configuration)?;
    Ok(Json(state.store.create_scorer(new).await?))
}

pub async fn get_scorer(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ScorerRecord>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.store.get_scorer(id).await?))
}

pub async fn update_scorer(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ScorerPatch>, JsonRejection>,
) -> Result<Json<ScorerRecord>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    if let Some(configuration) = &patch.configuration {
        ensure_object(configuration)?;
    }
    Ok(Json(state.store.update_scorer(id, patch).await?))
}

pub async fn delete_scorer(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    state.store.delete_scorer(id).await?;
    Ok(Json(json!({ "ok": true })))
}
