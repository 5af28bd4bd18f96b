//! Evaluation profiles. Scorer ids are not checked here; a dangling id is
//! skipped when a run executes.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use simpl_state::{NewProfile, ProfilePatch, ProfileRecord};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_profiles(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfileRecord>>, ApiError> {
    Ok(Json(state.store.list_profiles().await?))
}

pub async fn create_profile(
    State(state): State<AppState>,
    payload: Result<Json<NewProfile>, JsonRejection>,
) -> Result<Json<ProfileRecord>, ApiError> {
    let Json(new) = payload?;
    Ok(Json(state.store.create_profile(new).await?))
}

pub async fn get_profile(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ProfileRecord>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.store.get_profile(id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ProfilePatch>, JsonRejection>,
) -> Result<Json<ProfileRecord>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = payload?;
    Ok(Json(state.store.update_profile(id, patch).await?))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    state.store.delete_profile(id).await?;
    Ok(Json(json!({ "ok": true })))
}
