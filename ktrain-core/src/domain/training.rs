//! Training request domain types

use serde::{Deserialize, Serialize};

use super::credential::CredentialRef;
use super::fingerprint::Fingerprint;

/// CPU and memory for a training run
///
/// Applied as both request and limit so the pod lands in the Guaranteed
/// QoS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceProfile {
    pub cpu_millis: u32,
    pub memory_mib: u32,
}

impl ResourceProfile {
    /// CPU as a Kubernetes quantity, e.g. `1500m`.
    pub fn cpu_quantity(&self) -> String {
        format!("{}m", self.cpu_millis)
    }

    /// Memory as a Kubernetes quantity, e.g. `2048Mi`.
    pub fn memory_quantity(&self) -> String {
        format!("{}Mi", self.memory_mib)
    }
}

/// A single-shot training run requested by a project
///
/// Immutable once accepted by the dispatcher.
#[derive(Debug, Clone)]
pub struct TrainingRequest {
    pub project_id: String,
    pub script: Vec<u8>,
    pub data_reference: String,
    pub resources: Option<ResourceProfile>,
    /// Overrides the dispatcher's default storage credentials.
    pub credentials: Option<CredentialRef>,
    /// Restore and save the per-project training cache.
    pub use_cache: bool,
    /// Appended to the runtime command after the script path.
    pub extra_args: Vec<String>,
}

impl TrainingRequest {
    pub fn new(
        project_id: impl Into<String>,
        script: impl Into<Vec<u8>>,
        data_reference: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            script: script.into(),
            data_reference: data_reference.into(),
            resources: None,
            credentials: None,
            use_cache: true,
            extra_args: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: ResourceProfile) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialRef) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// The dedup key of this request.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute_with_args(
            &self.project_id,
            &self.script,
            &self.data_reference,
            &self.extra_args,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_quantities() {
        let profile = ResourceProfile {
            cpu_millis: 1500,
            memory_mib: 2048,
        };
        assert_eq!(profile.cpu_quantity(), "1500m");
        assert_eq!(profile.memory_quantity(), "2048Mi");
    }

    #[test]
    fn test_fingerprint_ignores_resources_and_credentials() {
        let plain = TrainingRequest::new("p1", "print(1)", "s3://d/v1");
        let tuned = TrainingRequest::new("p1", "print(1)", "s3://d/v1")
            .with_resources(ResourceProfile {
                cpu_millis: 4000,
                memory_mib: 8192,
            })
            .with_credentials(CredentialRef::parse("other-creds").unwrap());

        assert_eq!(plain.fingerprint(), tuned.fingerprint());
        assert_eq!(plain.fingerprint(), plain.clone().without_cache().fingerprint());
    }

    #[test]
    fn test_fingerprint_covers_extra_args() {
        let plain = TrainingRequest::new("p1", "print(1)", "s3://d/v1");
        let tuned = plain.clone().with_extra_args(["--epochs", "10"]);

        assert_eq!(tuned.extra_args, vec!["--epochs", "10"]);
        assert_ne!(plain.fingerprint(), tuned.fingerprint());
    }
}
