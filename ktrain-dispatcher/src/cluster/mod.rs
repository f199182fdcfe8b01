//! Cluster submission layer
//!
//! The [`SubmissionClient`] trait is the only way the dispatcher and the
//! reconciler reach the cluster. Implementations translate raw API failures
//! into [`ClusterError`] and retry transient ones before returning.

pub mod kube_client;
pub mod memory;
pub mod naming;
pub mod retry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::{Job, JobStatus};
use ktrain_core::domain::{Fingerprint, WorkloadPhase, WorkloadRecord};
use thiserror::Error;

use crate::manifest::RenderedManifest;

pub use kube_client::KubeSubmissionClient;
pub use memory::InMemoryCluster;
pub use naming::Naming;
pub use retry::RetryPolicy;

/// Cluster failures, classified at the submission boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// An object with this name already exists
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("object not found: {0}")]
    NotFound(String),

    /// Timeouts, throttling, transport and server errors
    #[error("transient cluster error: {0}")]
    Transient(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The API server refused the request as invalid
    #[error("rejected by cluster: {0}")]
    Rejected(String),
}

impl ClusterError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A script ConfigMap as seen by the orphan sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptObject {
    pub name: String,
    pub workload_id: String,
    pub created_at: DateTime<Utc>,
}

/// Workload API capability
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    /// Create the script object, then the workload named by the manifest.
    ///
    /// A name collision on the workload is reported as
    /// [`ClusterError::AlreadyExists`].
    async fn create(&self, manifest: &RenderedManifest) -> Result<WorkloadRecord, ClusterError>;

    /// Latest generation carrying both fingerprint labels.
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<WorkloadRecord>, ClusterError>;

    async fn get(&self, workload_id: &str) -> Result<Option<WorkloadRecord>, ClusterError>;

    async fn get_status(&self, workload_id: &str) -> Result<Option<WorkloadPhase>, ClusterError> {
        Ok(self.get(workload_id).await?.map(|record| record.phase))
    }

    /// Delete the workload object (its pods go with it).
    async fn delete(&self, workload_id: &str) -> Result<(), ClusterError>;

    /// Delete the workload's script object.
    async fn delete_script(&self, workload_id: &str) -> Result<(), ClusterError>;

    /// Every workload managed by this dispatcher.
    async fn list_workloads(&self) -> Result<Vec<WorkloadRecord>, ClusterError>;

    /// Every script object managed by this dispatcher.
    async fn list_scripts(&self) -> Result<Vec<ScriptObject>, ClusterError>;

    /// Log of the workload's pod, `None` until the pod has started.
    async fn logs(&self, workload_id: &str) -> Result<Option<String>, ClusterError>;
}

/// Phase and terminal details derived from a Job's status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobObservation {
    pub phase: WorkloadPhase,
    pub terminal_at: Option<DateTime<Utc>>,
    pub detail: Option<String>,
}

/// Map Job status onto the workload phase.
///
/// With `backoffLimit = 0` a single failed pod is final, so a failed count
/// is treated as terminal even before the `Failed` condition is posted.
/// Until then the terminal time comes from `FailureTarget`, or is left
/// unset for the observer to fill in.
pub fn observe_job(status: Option<&JobStatus>) -> JobObservation {
    let pending = JobObservation {
        phase: WorkloadPhase::Pending,
        terminal_at: None,
        detail: None,
    };
    let Some(status) = status else {
        return pending;
    };

    let condition = |kind: &str| {
        status
            .conditions
            .iter()
            .flatten()
            .find(|c| c.type_ == kind && c.status == "True")
    };

    if status.succeeded.unwrap_or(0) > 0 {
        let terminal_at = status
            .completion_time
            .as_ref()
            .map(|t| t.0)
            .or_else(|| condition("Complete").and_then(|c| c.last_transition_time.as_ref().map(|t| t.0)));
        return JobObservation {
            phase: WorkloadPhase::Succeeded,
            terminal_at,
            detail: None,
        };
    }

    let failed = condition("Failed");
    if failed.is_some() || status.failed.unwrap_or(0) > 0 {
        let stamped = failed.or_else(|| condition("FailureTarget"));
        let detail = failed.and_then(|c| match (&c.reason, &c.message) {
            (Some(reason), Some(message)) => Some(format!("{reason}: {message}")),
            (Some(reason), None) => Some(reason.clone()),
            (None, message) => message.clone(),
        });
        return JobObservation {
            phase: WorkloadPhase::Failed,
            terminal_at: stamped.and_then(|c| c.last_transition_time.as_ref().map(|t| t.0)),
            detail,
        };
    }

    if status.active.unwrap_or(0) > 0 && status.ready.unwrap_or(0) > 0 {
        return JobObservation {
            phase: WorkloadPhase::Running,
            ..pending
        };
    }

    pending
}

/// Project a Job onto a workload record.
///
/// Returns `None` for Jobs without the fingerprint labels, which are not
/// ours to track.
pub fn record_from_job(naming: &Naming, job: &Job) -> Option<WorkloadRecord> {
    let workload_id = job.metadata.name.clone()?;
    let labels = job.metadata.labels.as_ref()?;
    let (fingerprint, generation) = naming.parse_labels(labels)?;
    let observation = observe_job(job.status.as_ref());

    Some(WorkloadRecord {
        fingerprint,
        workload_id,
        generation,
        phase: observation.phase,
        created_at: job
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|t| t.0)
            .unwrap_or_else(Utc::now),
        terminal_at: observation.terminal_at,
        detail: observation.detail,
    })
}

/// Pick the highest generation out of a fingerprint's workloads.
pub fn latest_generation(
    records: impl IntoIterator<Item = WorkloadRecord>,
) -> Option<WorkloadRecord> {
    records.into_iter().max_by_key(|record| record.generation)
}
