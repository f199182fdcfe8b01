//! Workload API Handlers
//!
//! Status, wait, cancel and logs for submitted workloads.

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use ktrain_core::domain::WorkloadRecord;
use ktrain_core::dto::workload::{CancelResponse, ResultResponse, WaitQuery};

use crate::api::AppState;
use crate::api::error::ApiResult;

/// Wait used when the caller gives no timeout
pub const DEFAULT_WAIT_SECS: u64 = 300;

/// Longest wait a single request may hold open
pub const MAX_WAIT_SECS: u64 = 3600;

/// GET /workloads/{id}
pub async fn get_workload(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkloadRecord>> {
    tracing::debug!("Getting workload: {}", id);

    let record = state.dispatcher.status(&id).await?;
    Ok(Json(record))
}

/// GET /workloads/{id}/wait?timeout_secs=N
/// Block until the workload is terminal or the timeout elapses, then
/// return its current record. A disconnecting client drops the wait.
pub async fn wait_workload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WaitQuery>,
) -> ApiResult<Json<WorkloadRecord>> {
    let timeout = query
        .timeout_secs
        .unwrap_or(DEFAULT_WAIT_SECS)
        .min(MAX_WAIT_SECS);

    tracing::debug!("Waiting up to {}s for workload: {}", timeout, id);

    let outcome = state
        .dispatcher
        .wait(
            &id,
            Some(Duration::from_secs(timeout)),
            &state.shutdown.child_token(),
        )
        .await?;

    Ok(Json(outcome.into_record()))
}

/// POST /workloads/{id}/cancel
pub async fn cancel_workload(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    tracing::info!("Cancelling workload: {}", id);

    let cancelled = state.dispatcher.cancel(&id).await?;
    Ok(Json(CancelResponse { cancelled }))
}

/// GET /workloads/{id}/logs
/// Plain-text pod log; empty until the pod has started
pub async fn get_logs(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<String> {
    tracing::debug!("Getting logs for workload: {}", id);

    let logs = state.dispatcher.logs(&id).await?;
    Ok(logs.unwrap_or_default())
}

/// GET /workloads/{id}/result
/// Model location of a succeeded workload; 404 until it has one
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ResultResponse>> {
    tracing::debug!("Getting result of workload: {}", id);

    let artifact = state.dispatcher.result(&id).await?;
    Ok(Json(artifact.into()))
}
