//! Workload status DTOs

use serde::{Deserialize, Serialize};

/// Response body of `POST /workloads/{id}/cancel`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Response body of `GET /workloads/{id}/result`
///
/// Where the trained model of a succeeded workload was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultResponse {
    pub workload_id: String,
    /// Bucket holding the model, when the dispatcher is configured with one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Object key of the model archive
    pub model_path: String,
}

/// Query parameters of `GET /workloads/{id}/wait`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitQuery {
    /// Give up waiting after this many seconds and return the current state
    pub timeout_secs: Option<u64>,
}
