//! Training API Handlers

use axum::{Json, extract::State};
use ktrain_core::domain::TrainingRequest;
use ktrain_core::dto::training::{DispatchResponse, SubmitTraining};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::dispatcher::DispatchOptions;

/// POST /train
/// Submit a training run, or attach to / reuse an identical one
pub async fn submit_training(
    State(state): State<AppState>,
    Json(req): Json<SubmitTraining>,
) -> ApiResult<Json<DispatchResponse>> {
    tracing::info!("Training requested for project: {}", req.project_id);

    let options = DispatchOptions { force: req.force };
    let request = TrainingRequest::try_from(req).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let dispatch = state.dispatcher.dispatch(request, options).await?;

    Ok(Json(dispatch.into()))
}
