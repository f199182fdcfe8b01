//! Training submission DTOs

use serde::{Deserialize, Serialize};

use crate::domain::credential::CredentialRef;
use crate::domain::training::{ResourceProfile, TrainingRequest};
use crate::domain::workload::{Disposition, WorkloadPhase};
use crate::validation::ReferenceError;

/// Request body of `POST /train`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTraining {
    pub project_id: String,
    pub script: String,
    pub data_reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceProfile>,
    /// Secret name overriding the default storage credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
    /// Bypass the reuse window and resubmit a terminal fingerprint
    #[serde(default)]
    pub force: bool,
    /// Restore and save the per-project training cache
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    /// Arguments appended after the script path; part of the fingerprint
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,
}

fn default_use_cache() -> bool {
    true
}

impl TryFrom<SubmitTraining> for TrainingRequest {
    type Error = ReferenceError;

    fn try_from(req: SubmitTraining) -> Result<Self, Self::Error> {
        let credentials = req
            .credentials
            .as_deref()
            .map(CredentialRef::parse)
            .transpose()?;

        Ok(TrainingRequest {
            project_id: req.project_id,
            script: req.script.into_bytes(),
            data_reference: req.data_reference,
            resources: req.resources,
            credentials,
            use_cache: req.use_cache,
            extra_args: req.extra_args,
        })
    }
}

/// Response body of `POST /train`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub workload_id: String,
    pub project_id: String,
    pub data_hash: String,
    pub phase: WorkloadPhase,
    pub disposition: Disposition,
}
