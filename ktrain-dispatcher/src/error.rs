//! Dispatcher error type

use ktrain_core::domain::WorkloadPhase;
use ktrain_core::validation::{ReferenceError, ValidationError};
use thiserror::Error;

use crate::cluster::ClusterError;
use crate::manifest::ManifestError;

/// Failures surfaced to callers of the dispatcher
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// The retry budget ran out on a transient cluster failure.
    #[error("cluster unavailable: {0}")]
    ClusterTransient(String),

    #[error("cluster refused our credentials: {0}")]
    ClusterAuthorization(String),

    #[error("namespace quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("cluster rejected the workload: {0}")]
    Rejected(String),

    #[error("workload {0} not found")]
    NotFound(String),

    /// The workload exists but has not produced a model.
    #[error("workload {workload_id} has no result: it is {phase}")]
    NoResult {
        workload_id: String,
        phase: WorkloadPhase,
    },
}

impl From<ClusterError> for DispatchError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::Transient(msg) => Self::ClusterTransient(msg),
            ClusterError::Unauthorized(msg) => Self::ClusterAuthorization(msg),
            ClusterError::QuotaExceeded(msg) => Self::QuotaExceeded(msg),
            ClusterError::NotFound(name) => Self::NotFound(name),
            // A collision the caller could not resolve by attaching.
            ClusterError::AlreadyExists(msg) | ClusterError::Rejected(msg) => Self::Rejected(msg),
        }
    }
}

impl From<ManifestError> for DispatchError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Validation(e) => Self::Validation(e),
            ManifestError::Reference(e) => Self::Reference(e),
            ManifestError::Render(msg) => Self::Rejected(msg),
        }
    }
}
