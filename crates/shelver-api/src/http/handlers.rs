//! HTTP handlers: synchronous organize, batch submit, batch status.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use shelver_types::batch::{ProcessRequest, SubmitReceipt};
use shelver_types::organize::{OrganizeOutcome, OrganizeRequest};

use crate::http::error::AppError;
use crate::state::AppState;

/// POST /organize - Synchronously produce a grouping plan for given files.
pub async fn organize(
    State(state): State<AppState>,
    Json(body): Json<OrganizeRequest>,
) -> Result<Json<OrganizeOutcome>, AppError> {
    let outcome = state.organize_service.organize(&body).await?;
    Ok(Json(outcome))
}

/// POST /process - Submit a batch of directory ids for async organization.
pub async fn process(
    State(state): State<AppState>,
    Json(body): Json<ProcessRequest>,
) -> Result<Json<SubmitReceipt>, AppError> {
    let receipt = state.batch_processor.submit(body).await?;
    Ok(Json(receipt))
}

/// GET /status/{batch_id}/{chunk_id} - Poll batch progress. Read-only.
pub async fn status(
    State(state): State<AppState>,
    Path((batch_id, chunk_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    match state.batch_processor.status(&batch_id, &chunk_id).await? {
        Some(report) => Ok(Json(serde_json::to_value(report).unwrap_or_default())),
        None => Ok(Json(json!({ "status": "not_found" }))),
    }
}

/// GET /health - Liveness only.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
