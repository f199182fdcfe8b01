//! API Error Handling
//!
//! Maps dispatcher failures onto HTTP statuses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::DispatchError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    /// Quota exhausted in the training namespace
    TooManyRequests(String),
    /// The cluster refused us or the workload
    BadGateway(String),
    /// The cluster could not be reached within the retry budget
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing or invalid bearer token".to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            ApiError::BadGateway(msg) => {
                tracing::error!("Cluster error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            ApiError::Unavailable(msg) => {
                tracing::error!("Cluster unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::Validation(_) | DispatchError::Reference(_) => {
                ApiError::BadRequest(message)
            }
            DispatchError::NotFound(_) | DispatchError::NoResult { .. } => {
                ApiError::NotFound(message)
            }
            DispatchError::QuotaExceeded(_) => ApiError::TooManyRequests(message),
            DispatchError::ClusterAuthorization(_) | DispatchError::Rejected(_) => {
                ApiError::BadGateway(message)
            }
            DispatchError::ClusterTransient(_) => ApiError::Unavailable(message),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
