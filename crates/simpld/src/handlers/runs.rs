//! Evaluation runs.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use simpl_core::TriggerRequest;
use simpl_state::{EvalRunRecord, RunStatus};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunsQuery {
    pub profile_id: Option<Uuid>,
}

/// Validate and persist a run, then return while it executes in the
/// background.
pub async fn trigger_run(
    State(state): State<AppState>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ApiError> {
    let Json(request) = payload?;
    let run = state.orchestrator.trigger(request).await?;
    Ok(Json(RunResponse {
        run_id: run.id,
        status: run.status,
    }))
}

pub async fn list_runs(
    State(state): State<AppState>,
    query: Result<Query<RunsQuery>, QueryRejection>,
) -> Result<Json<Vec<EvalRunRecord>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.store.list_runs(query.profile_id).await?))
}

pub async fn get_run(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<EvalRunRecord>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.store.get_run(id).await?))
}

/// Deletes in any status. An executing run is not cancelled; its final
/// write fails and is logged.
pub async fn delete_run(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    state.store.delete_run(id).await?;
    Ok(Json(json!({ "ok": true })))
}
