//! Manifest Builder
//!
//! Renders a training request into a `batch/v1` Job and the ConfigMap that
//! carries its script. Nothing in here talks to the cluster: every rejection
//! happens before a single API call is made.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use ktrain_core::domain::{CredentialRef, Fingerprint, ResourceProfile, TrainingRequest};
use ktrain_core::validation::{
    ReferenceError, ValidationError, is_dns_label, is_dns_subdomain, validate_data_reference,
    validate_extra_args, validate_image, validate_project_id,
};
use serde_json::json;
use thiserror::Error;

use crate::cluster::Naming;

/// Where the script ConfigMap is mounted inside the container.
pub const SCRIPT_MOUNT_PATH: &str = "/opt/training";

/// Scratch directory and working directory of the training process.
pub const WORKSPACE_PATH: &str = "/workspace";

/// ConfigMaps are capped at 1 MiB including metadata.
pub const MAX_SCRIPT_BYTES: usize = 900 * 1024;

/// File name of the model archive under a workload's output prefix.
pub const MODEL_ARCHIVE: &str = "model.tar.gz";

/// `0555`: readable and executable, never writable.
const SCRIPT_FILE_MODE: i32 = 0o555;

const CONTAINER_NAME: &str = "trainer";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// The rendered document did not deserialize into a Job.
    #[error("failed to render workload manifest: {0}")]
    Render(String),
}

/// Object storage coordinates handed to the training container
#[derive(Debug, Clone, Default)]
pub struct StorageSettings {
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// Root under which trained models are written.
    pub output_prefix: String,
    /// Root of the per-project training cache, if caching is enabled.
    pub cache_prefix: Option<String>,
}

/// Cluster-wide settings for every rendered workload
#[derive(Debug, Clone)]
pub struct ManifestSettings {
    pub namespace: String,
    pub naming: Naming,
    pub image: String,
    /// Interpreter and arguments, the script path is appended.
    pub runtime_command: Vec<String>,
    pub script_file: String,
    pub run_as_user: i64,
    pub default_resources: ResourceProfile,
    pub max_resources: ResourceProfile,
    pub default_credentials: CredentialRef,
    pub pull_secret: Option<String>,
    pub active_deadline_secs: Option<i64>,
    pub storage: StorageSettings,
}

impl ManifestSettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_dns_label(&self.namespace) {
            anyhow::bail!("namespace '{}' must be a DNS label", self.namespace);
        }

        self.naming.validate()?;
        validate_image(&self.image)?;

        if self.runtime_command.is_empty() {
            anyhow::bail!("runtime command cannot be empty");
        }

        if self.script_file.is_empty() || self.script_file.contains('/') {
            anyhow::bail!("script file '{}' must be a plain file name", self.script_file);
        }

        if self.run_as_user <= 0 {
            anyhow::bail!("training pods must run as a non-root uid");
        }

        check_resources(&self.max_resources, &self.max_resources)?;
        check_resources(&self.default_resources, &self.max_resources)?;

        if let Some(secret) = &self.pull_secret {
            if !is_dns_subdomain(secret) {
                anyhow::bail!("pull secret '{}' must be a DNS subdomain", secret);
            }
        }

        if matches!(self.active_deadline_secs, Some(secs) if secs <= 0) {
            anyhow::bail!("active deadline must be positive");
        }

        Ok(())
    }

    fn script_path(&self) -> String {
        format!("{}/{}", SCRIPT_MOUNT_PATH, self.script_file)
    }

    /// Storage prefix a fingerprint's run writes its outputs under.
    pub fn output_prefix(&self, fingerprint: &Fingerprint) -> String {
        format!(
            "{}/{}/{}",
            self.storage.output_prefix.trim_end_matches('/'),
            fingerprint.project_id,
            fingerprint.data_hash
        )
    }

    /// Object key of the model archive a fingerprint's run produces.
    pub fn model_path(&self, fingerprint: &Fingerprint) -> String {
        format!("{}/{}", self.output_prefix(fingerprint), MODEL_ARCHIVE)
    }
}

/// Output of the builder, ready for submission
#[derive(Debug, Clone)]
pub struct RenderedManifest {
    pub workload_id: String,
    pub script_name: String,
    pub fingerprint: Fingerprint,
    pub generation: u32,
    pub job: Job,
    pub script: ConfigMap,
}

#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    settings: ManifestSettings,
}

impl ManifestBuilder {
    pub fn new(settings: ManifestSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ManifestSettings {
        &self.settings
    }

    pub fn naming(&self) -> &Naming {
        &self.settings.naming
    }

    /// Check a request without rendering it; returns the effective resources.
    pub fn validate(&self, request: &TrainingRequest) -> Result<ResourceProfile, ManifestError> {
        validate_project_id(&request.project_id)?;

        if request.script.is_empty() {
            return Err(ValidationError::EmptyField("script".to_string()).into());
        }
        if request.script.len() > MAX_SCRIPT_BYTES {
            return Err(ValidationError::MaxLengthExceeded {
                field: "script".to_string(),
                max: MAX_SCRIPT_BYTES,
            }
            .into());
        }

        validate_data_reference(&request.data_reference)?;
        validate_extra_args(&request.extra_args)?;

        let resources = request
            .resources
            .unwrap_or(self.settings.default_resources);
        check_resources(&resources, &self.settings.max_resources)?;

        Ok(resources)
    }

    /// Render the Job and script ConfigMap for one generation of a fingerprint.
    pub fn build(
        &self,
        request: &TrainingRequest,
        fingerprint: &Fingerprint,
        generation: u32,
    ) -> Result<RenderedManifest, ManifestError> {
        let resources = self.validate(request)?;
        let settings = &self.settings;
        let naming = &settings.naming;

        let workload_id = naming.workload_name(fingerprint, generation);
        let script_name = Naming::script_name(&workload_id);
        let labels = naming.labels(fingerprint, generation);
        let credentials = request
            .credentials
            .as_ref()
            .unwrap_or(&settings.default_credentials);

        let mut command = settings.runtime_command.clone();
        command.push(settings.script_path());

        let mut job = json!({
            "apiVersion": "batch/v1",
            "kind": "Job",
            "metadata": {
                "name": workload_id,
                "namespace": settings.namespace,
                "labels": labels,
                "annotations": {
                    naming.data_reference_annotation(): request.data_reference,
                },
            },
            "spec": {
                "backoffLimit": 0,
                "template": {
                    "metadata": { "labels": labels },
                    "spec": {
                        "restartPolicy": "Never",
                        "automountServiceAccountToken": false,
                        "enableServiceLinks": false,
                        "securityContext": {
                            "runAsNonRoot": true,
                            "runAsUser": settings.run_as_user,
                            "runAsGroup": settings.run_as_user,
                            "fsGroup": settings.run_as_user,
                            "seccompProfile": { "type": "RuntimeDefault" },
                        },
                        "containers": [{
                            "name": CONTAINER_NAME,
                            "image": settings.image,
                            "imagePullPolicy": "IfNotPresent",
                            "command": command,
                            "args": request.extra_args,
                            "workingDir": WORKSPACE_PATH,
                            "env": self.environment(request, fingerprint, &workload_id),
                            "envFrom": [{ "secretRef": { "name": credentials.secret_name() } }],
                            "resources": {
                                "requests": {
                                    "cpu": resources.cpu_quantity(),
                                    "memory": resources.memory_quantity(),
                                },
                                "limits": {
                                    "cpu": resources.cpu_quantity(),
                                    "memory": resources.memory_quantity(),
                                },
                            },
                            "securityContext": {
                                "runAsNonRoot": true,
                                "allowPrivilegeEscalation": false,
                                "readOnlyRootFilesystem": true,
                                "capabilities": { "drop": ["ALL"] },
                            },
                            "volumeMounts": [
                                { "name": "script", "mountPath": SCRIPT_MOUNT_PATH, "readOnly": true },
                                { "name": "workspace", "mountPath": WORKSPACE_PATH },
                                { "name": "tmp", "mountPath": "/tmp" },
                            ],
                        }],
                        "volumes": [
                            {
                                "name": "script",
                                "configMap": { "name": script_name, "defaultMode": SCRIPT_FILE_MODE },
                            },
                            { "name": "workspace", "emptyDir": {} },
                            { "name": "tmp", "emptyDir": {} },
                        ],
                    },
                },
            },
        });

        if let Some(deadline) = settings.active_deadline_secs {
            job["spec"]["activeDeadlineSeconds"] = json!(deadline);
        }
        if let Some(secret) = &settings.pull_secret {
            job["spec"]["template"]["spec"]["imagePullSecrets"] = json!([{ "name": secret }]);
        }

        let job: Job =
            serde_json::from_value(job).map_err(|e| ManifestError::Render(e.to_string()))?;

        Ok(RenderedManifest {
            script: self.script_config_map(request, fingerprint, generation, &workload_id),
            workload_id,
            script_name,
            fingerprint: fingerprint.clone(),
            generation,
            job,
        })
    }

    fn environment(
        &self,
        request: &TrainingRequest,
        fingerprint: &Fingerprint,
        workload_id: &str,
    ) -> Vec<serde_json::Value> {
        let storage = &self.settings.storage;
        let mut vars = vec![
            ("WORKLOAD_ID", workload_id.to_string()),
            ("PROJECT_ID", fingerprint.project_id.clone()),
            ("DATA_HASH", fingerprint.data_hash.clone()),
            ("DATA_REFERENCE", request.data_reference.clone()),
            ("SCRIPT_PATH", self.settings.script_path()),
            ("OUTPUT_PREFIX", self.settings.output_prefix(fingerprint)),
            ("MODEL_PATH", self.settings.model_path(fingerprint)),
        ];
        let cache_prefix = storage.cache_prefix.as_ref().filter(|_| request.use_cache);

        let optional = [
            ("STORAGE_BUCKET", storage.bucket.clone()),
            ("STORAGE_ENDPOINT", storage.endpoint.clone()),
            ("STORAGE_REGION", storage.region.clone()),
            (
                "CACHE_PATH",
                cache_prefix.map(|prefix| {
                    format!(
                        "{}/{}/cache.tar.gz",
                        prefix.trim_end_matches('/'),
                        fingerprint.project_id
                    )
                }),
            ),
        ];
        vars.extend(
            optional
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v))),
        );

        vars.into_iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect()
    }

    fn script_config_map(
        &self,
        request: &TrainingRequest,
        fingerprint: &Fingerprint,
        generation: u32,
        workload_id: &str,
    ) -> ConfigMap {
        let naming = &self.settings.naming;
        let mut labels = naming.labels(fingerprint, generation);
        labels.insert(naming.workload_label(), workload_id.to_string());

        let key = self.settings.script_file.clone();
        let (data, binary_data) = match std::str::from_utf8(&request.script) {
            Ok(text) => (Some(BTreeMap::from([(key, text.to_string())])), None),
            Err(_) => (
                None,
                Some(BTreeMap::from([(key, ByteString(request.script.clone()))])),
            ),
        };

        ConfigMap {
            metadata: ObjectMeta {
                name: Some(Naming::script_name(workload_id)),
                namespace: Some(self.settings.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            data,
            binary_data,
            immutable: Some(true),
        }
    }
}

fn check_resources(
    resources: &ResourceProfile,
    ceiling: &ResourceProfile,
) -> Result<(), ValidationError> {
    let checks = [
        ("cpu_millis", resources.cpu_millis, ceiling.cpu_millis),
        ("memory_mib", resources.memory_mib, ceiling.memory_mib),
    ];

    for (resource, value, max) in checks {
        if value == 0 {
            return Err(ValidationError::NonPositiveResource {
                resource: resource.to_string(),
            });
        }
        if value > max {
            return Err(ValidationError::ResourceCeilingExceeded {
                resource: resource.to_string(),
                value,
                ceiling: max,
            });
        }
    }

    Ok(())
}
