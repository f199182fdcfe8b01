//! Kubernetes-backed submission client

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use kube::Client;
use ktrain_core::domain::{Fingerprint, WorkloadRecord};
use tracing::{debug, info};

use super::retry::{RetryPolicy, bounded, with_backoff};
use super::{ClusterError, Naming, ScriptObject, SubmissionClient, latest_generation, record_from_job};
use crate::manifest::RenderedManifest;

/// Label the Job controller puts on the pods it creates.
const JOB_NAME_LABEL: &str = "job-name";

/// Submission client talking to the API server of one namespace
#[derive(Clone)]
pub struct KubeSubmissionClient {
    jobs: Api<Job>,
    config_maps: Api<ConfigMap>,
    pods: Api<Pod>,
    naming: Naming,
    retry: RetryPolicy,
    timeout: Duration,
}

impl KubeSubmissionClient {
    pub fn new(
        client: Client,
        namespace: &str,
        naming: Naming,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            jobs: Api::namespaced(client.clone(), namespace),
            config_maps: Api::namespaced(client.clone(), namespace),
            pods: Api::namespaced(client, namespace),
            naming,
            retry,
            timeout,
        }
    }

    /// Connect using the in-cluster service account or the local kubeconfig.
    pub async fn connect(
        namespace: &str,
        naming: Naming,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to build Kubernetes client")?;

        info!("Connected to Kubernetes API, namespace {}", namespace);

        Ok(Self::new(client, namespace, naming, retry, timeout))
    }

    /// Run one API call under the timeout and retry policy, classifying
    /// whatever error comes out.
    async fn call<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ClusterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, kube::Error>>,
    {
        let timeout = self.timeout;
        with_backoff(&self.retry, what, move || {
            let fut = op();
            async move { bounded(timeout, what, async move { fut.await.map_err(classify) }).await }
        })
        .await
    }

    async fn list_jobs(&self, selector: &str) -> Result<Vec<Job>, ClusterError> {
        let jobs = &self.jobs;
        let params = ListParams::default().labels(selector);
        let params = &params;
        let list = self.call("list workloads", move || jobs.list(params)).await?;
        Ok(list.items)
    }
}

#[async_trait]
impl SubmissionClient for KubeSubmissionClient {
    async fn create(&self, manifest: &RenderedManifest) -> Result<WorkloadRecord, ClusterError> {
        let params = PostParams::default();
        let params = &params;

        let config_maps = &self.config_maps;
        let script = &manifest.script;
        match self
            .call("create script", move || config_maps.create(params, script))
            .await
        {
            Ok(_) => debug!("Created script {}", manifest.script_name),
            Err(ClusterError::AlreadyExists(_)) => {
                debug!("Script {} already exists", manifest.script_name)
            }
            Err(e) => return Err(e),
        }

        let jobs = &self.jobs;
        let job = &manifest.job;
        let created = self
            .call("create workload", move || jobs.create(params, job))
            .await?;

        record_from_job(&self.naming, &created).ok_or_else(|| {
            ClusterError::Rejected(format!(
                "workload {} was created without fingerprint labels",
                manifest.workload_id
            ))
        })
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<WorkloadRecord>, ClusterError> {
        let jobs = self
            .list_jobs(&self.naming.fingerprint_selector(fingerprint))
            .await?;

        Ok(latest_generation(
            jobs.iter()
                .filter_map(|job| record_from_job(&self.naming, job)),
        ))
    }

    async fn get(&self, workload_id: &str) -> Result<Option<WorkloadRecord>, ClusterError> {
        let jobs = &self.jobs;
        let job = self
            .call("get workload", move || jobs.get_opt(workload_id))
            .await?;

        Ok(job.and_then(|job| record_from_job(&self.naming, &job)))
    }

    async fn delete(&self, workload_id: &str) -> Result<(), ClusterError> {
        let jobs = &self.jobs;
        let params = DeleteParams::background();
        let params = &params;
        self.call("delete workload", move || jobs.delete(workload_id, params))
            .await?;
        Ok(())
    }

    async fn delete_script(&self, workload_id: &str) -> Result<(), ClusterError> {
        let config_maps = &self.config_maps;
        let name = Naming::script_name(workload_id);
        let name = name.as_str();
        let params = DeleteParams::default();
        let params = &params;
        self.call("delete script", move || config_maps.delete(name, params))
            .await?;
        Ok(())
    }

    async fn list_workloads(&self) -> Result<Vec<WorkloadRecord>, ClusterError> {
        let jobs = self.list_jobs(&self.naming.managed_selector()).await?;
        Ok(jobs
            .iter()
            .filter_map(|job| record_from_job(&self.naming, job))
            .collect())
    }

    async fn list_scripts(&self) -> Result<Vec<ScriptObject>, ClusterError> {
        let config_maps = &self.config_maps;
        let params = ListParams::default().labels(&self.naming.managed_selector());
        let params = &params;
        let list = self
            .call("list scripts", move || config_maps.list(params))
            .await?;

        let workload_label = self.naming.workload_label();
        Ok(list
            .items
            .into_iter()
            .filter_map(|cm| {
                let name = cm.metadata.name?;
                let workload_id = cm.metadata.labels?.remove(&workload_label)?;
                let created_at = cm.metadata.creation_timestamp?.0;
                Some(ScriptObject {
                    name,
                    workload_id,
                    created_at,
                })
            })
            .collect())
    }

    async fn logs(&self, workload_id: &str) -> Result<Option<String>, ClusterError> {
        let pods = &self.pods;
        let selector = format!("{}={}", JOB_NAME_LABEL, workload_id);
        let params = ListParams::default().labels(&selector);
        let params = &params;
        let list = self.call("list pods", move || pods.list(params)).await?;

        let Some(pod) = list
            .items
            .into_iter()
            .max_by_key(|pod| pod.metadata.creation_timestamp.as_ref().map(|t| t.0))
        else {
            return Ok(None);
        };
        let Some(pod_name) = pod.metadata.name else {
            return Ok(None);
        };

        let pod_name = pod_name.as_str();
        let params = LogParams::default();
        let params = &params;
        match self
            .call("read logs", move || pods.logs(pod_name, params))
            .await
        {
            Ok(text) => Ok(Some(text)),
            // The API answers 400 while the container is still being created.
            Err(ClusterError::Rejected(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Map a raw client error into the submission error taxonomy.
pub fn classify(err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(response) => {
            classify_api(response.code, &response.reason, &response.message)
        }
        kube::Error::Auth(e) => ClusterError::Unauthorized(e.to_string()),
        kube::Error::SerdeError(e) => ClusterError::Rejected(e.to_string()),
        other => ClusterError::Transient(other.to_string()),
    }
}

/// Classify an API server status response.
pub fn classify_api(code: u16, reason: &str, message: &str) -> ClusterError {
    let message = message.to_string();
    match code {
        409 if reason == "AlreadyExists" => ClusterError::AlreadyExists(message),
        404 => ClusterError::NotFound(message),
        401 => ClusterError::Unauthorized(message),
        403 if message.contains("exceeded quota") => ClusterError::QuotaExceeded(message),
        403 => ClusterError::Unauthorized(message),
        409 | 429 | 500 | 502 | 503 | 504 => ClusterError::Transient(message),
        _ => ClusterError::Rejected(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_collision_is_already_exists() {
        assert!(matches!(
            classify_api(409, "AlreadyExists", "jobs.batch \"et-abc-0\" already exists"),
            ClusterError::AlreadyExists(_)
        ));
    }

    #[test]
    fn test_update_conflict_is_transient() {
        assert!(classify_api(409, "Conflict", "the object has been modified").is_transient());
    }

    #[test]
    fn test_authorization_failures_are_permanent() {
        assert!(matches!(
            classify_api(401, "Unauthorized", "Unauthorized"),
            ClusterError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_api(403, "Forbidden", "jobs.batch is forbidden: User cannot create"),
            ClusterError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_quota_rejection() {
        let err = classify_api(
            403,
            "Forbidden",
            "pods \"et-abc-0\" is forbidden: exceeded quota: compute, requested: cpu=4",
        );
        assert!(matches!(err, ClusterError::QuotaExceeded(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_throttling_and_server_errors_are_transient() {
        for code in [429, 500, 502, 503, 504] {
            assert!(classify_api(code, "", "try again").is_transient(), "{code}");
        }
    }

    #[test]
    fn test_other_codes_are_rejected() {
        assert!(matches!(
            classify_api(422, "Invalid", "spec.template: Invalid value"),
            ClusterError::Rejected(_)
        ));
        assert!(matches!(
            classify_api(404, "NotFound", "jobs.batch \"x\" not found"),
            ClusterError::NotFound(_)
        ));
    }
}
