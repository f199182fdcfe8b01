//! Dispatcher
//!
//! Turns training requests into workloads. Dedup never takes a lock: the
//! dispatcher looks up the fingerprint, and when it has to submit it lets
//! the cluster's atomic create decide. A lost race is read back and joined.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ktrain_core::domain::{Disposition, TrainingRequest, WorkloadPhase, WorkloadRecord};
use ktrain_core::dto::training::DispatchResponse;
use ktrain_core::dto::workload::ResultResponse;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterError, SubmissionClient};
use crate::error::DispatchError;
use crate::manifest::ManifestBuilder;

/// When a terminal result may be returned instead of running again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReusePolicy {
    pub window: Duration,
    /// Whether a Failed result is returned within the window too.
    pub reuse_failed: bool,
}

impl Default for ReusePolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3600),
            reuse_failed: true,
        }
    }
}

impl ReusePolicy {
    /// Whether `record` can be handed back at `now` without resubmitting.
    pub fn allows(&self, record: &WorkloadRecord, now: DateTime<Utc>) -> bool {
        // Unstamped terminal records were only just observed finishing.
        let Some(finished) = record.finished_at(now) else {
            return false;
        };

        let eligible = match record.phase {
            WorkloadPhase::Succeeded => true,
            WorkloadPhase::Failed => self.reuse_failed,
            _ => false,
        };

        let age = now.signed_duration_since(finished);
        eligible
            && age
                .to_std()
                .map(|age| age < self.window)
                // Finished "in the future" means clock skew; treat as fresh.
                .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Resubmit a terminal fingerprint even inside the reuse window.
    pub force: bool,
}

/// The workload a request resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub record: WorkloadRecord,
    pub disposition: Disposition,
}

impl From<Dispatch> for DispatchResponse {
    fn from(dispatch: Dispatch) -> Self {
        let record = dispatch.record;
        DispatchResponse {
            workload_id: record.workload_id,
            project_id: record.fingerprint.project_id,
            data_hash: record.fingerprint.data_hash,
            phase: record.phase,
            disposition: dispatch.disposition,
        }
    }
}

/// Where a succeeded workload left its model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    pub workload_id: String,
    pub bucket: Option<String>,
    pub model_path: String,
}

impl From<ModelArtifact> for ResultResponse {
    fn from(artifact: ModelArtifact) -> Self {
        ResultResponse {
            workload_id: artifact.workload_id,
            bucket: artifact.bucket,
            model_path: artifact.model_path,
        }
    }
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The workload reached a terminal phase.
    Finished(WorkloadRecord),
    /// The waiter gave up (timeout or cancellation); the workload keeps running.
    Detached(WorkloadRecord),
}

impl WaitOutcome {
    pub fn record(&self) -> &WorkloadRecord {
        match self {
            Self::Finished(record) | Self::Detached(record) => record,
        }
    }

    pub fn into_record(self) -> WorkloadRecord {
        match self {
            Self::Finished(record) | Self::Detached(record) => record,
        }
    }
}

pub struct Dispatcher {
    cluster: Arc<dyn SubmissionClient>,
    builder: ManifestBuilder,
    reuse: ReusePolicy,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        cluster: Arc<dyn SubmissionClient>,
        builder: ManifestBuilder,
        reuse: ReusePolicy,
        poll_interval: Duration,
    ) -> Self {
        Self {
            cluster,
            builder,
            reuse,
            poll_interval,
        }
    }

    pub async fn dispatch(
        &self,
        request: TrainingRequest,
        options: DispatchOptions,
    ) -> Result<Dispatch, DispatchError> {
        self.dispatch_at(request, options, Utc::now()).await
    }

    /// Dispatch with an explicit notion of "now" for the reuse window.
    pub async fn dispatch_at(
        &self,
        request: TrainingRequest,
        options: DispatchOptions,
        now: DateTime<Utc>,
    ) -> Result<Dispatch, DispatchError> {
        self.builder.validate(&request)?;
        let fingerprint = request.fingerprint();

        let generation = match self.cluster.find_by_fingerprint(&fingerprint).await? {
            Some(record) if record.phase.is_active() => {
                info!(
                    "Attaching to in-flight workload {} for {}",
                    record.workload_id, fingerprint
                );
                return Ok(Dispatch {
                    record,
                    disposition: Disposition::Attached,
                });
            }
            Some(record) if !options.force && self.reuse.allows(&record, now) => {
                info!(
                    "Reusing {} result of workload {} for {}",
                    record.phase, record.workload_id, fingerprint
                );
                return Ok(Dispatch {
                    record,
                    disposition: Disposition::Reused,
                });
            }
            Some(record) => {
                debug!(
                    "Workload {} is {}, resubmitting as generation {}",
                    record.workload_id,
                    record.phase,
                    record.generation + 1
                );
                record.generation + 1
            }
            None => 0,
        };

        let manifest = self.builder.build(&request, &fingerprint, generation)?;

        match self.cluster.create(&manifest).await {
            Ok(record) => {
                info!(
                    "Submitted workload {} for {}",
                    record.workload_id, fingerprint
                );
                Ok(Dispatch {
                    record,
                    disposition: Disposition::Created,
                })
            }
            Err(ClusterError::AlreadyExists(_)) => {
                let record = self
                    .cluster
                    .get(&manifest.workload_id)
                    .await?
                    .ok_or_else(|| {
                        DispatchError::ClusterTransient(format!(
                            "workload {} vanished after a name collision",
                            manifest.workload_id
                        ))
                    })?;

                info!(
                    "Lost create race for {}, attaching to {}",
                    fingerprint, record.workload_id
                );
                Ok(Dispatch {
                    record,
                    disposition: Disposition::Attached,
                })
            }
            Err(e) => {
                warn!("Failed to submit workload {}: {}", manifest.workload_id, e);
                Err(e.into())
            }
        }
    }

    pub async fn status(&self, workload_id: &str) -> Result<WorkloadRecord, DispatchError> {
        self.cluster
            .get(workload_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(workload_id.to_string()))
    }

    /// Poll until the workload is terminal, `timeout` elapses or `cancel`
    /// fires. Giving up never touches the workload.
    pub async fn wait(
        &self,
        workload_id: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<WaitOutcome, DispatchError> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let record = self.status(workload_id).await?;
            if record.phase.is_terminal() {
                return Ok(WaitOutcome::Finished(record));
            }

            let mut pause = self.poll_interval;
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(WaitOutcome::Detached(record));
                }
                pause = pause.min(remaining);
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Waiter on {} detached", workload_id);
                    return Ok(WaitOutcome::Detached(record));
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Stop a Pending or Running workload. Returns `false` when it was
    /// already terminal.
    pub async fn cancel(&self, workload_id: &str) -> Result<bool, DispatchError> {
        let record = self.status(workload_id).await?;
        if record.phase.is_terminal() {
            return Ok(false);
        }

        match self.cluster.delete(workload_id).await {
            Ok(()) => {}
            // Deleted concurrently, nothing left to stop.
            Err(ClusterError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        match self.cluster.delete_script(workload_id).await {
            Ok(()) | Err(ClusterError::NotFound(_)) => {}
            Err(e) => warn!("Failed to delete script of {}: {}", workload_id, e),
        }

        info!("Cancelled workload {}", workload_id);
        Ok(true)
    }

    /// Location of the trained model; only Succeeded workloads have one.
    pub async fn result(&self, workload_id: &str) -> Result<ModelArtifact, DispatchError> {
        let record = self.status(workload_id).await?;
        if record.phase != WorkloadPhase::Succeeded {
            return Err(DispatchError::NoResult {
                workload_id: record.workload_id,
                phase: record.phase,
            });
        }

        let settings = self.builder.settings();
        Ok(ModelArtifact {
            model_path: settings.model_path(&record.fingerprint),
            bucket: settings.storage.bucket.clone(),
            workload_id: record.workload_id,
        })
    }

    pub async fn logs(&self, workload_id: &str) -> Result<Option<String>, DispatchError> {
        self.status(workload_id).await?;
        Ok(self.cluster.logs(workload_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{InMemoryCluster, Naming, ScriptObject};
    use crate::manifest::RenderedManifest;
    use crate::manifest::tests::settings;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use ktrain_core::domain::{Fingerprint, ResourceProfile};
    use ktrain_core::validation::ValidationError;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn setup(reuse: ReusePolicy) -> (Arc<InMemoryCluster>, Dispatcher) {
        let cluster = Arc::new(InMemoryCluster::default());
        let dispatcher = Dispatcher::new(
            cluster.clone(),
            ManifestBuilder::new(settings()),
            reuse,
            Duration::from_millis(5),
        );
        (cluster, dispatcher)
    }

    fn request() -> TrainingRequest {
        TrainingRequest::new("p1", "print(1)", "s3://d/v1")
    }

    #[tokio::test]
    async fn test_first_submission_creates_generation_zero() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());

        let dispatch = dispatcher
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();

        assert_eq!(dispatch.disposition, Disposition::Created);
        assert_eq!(dispatch.record.phase, WorkloadPhase::Pending);
        assert_eq!(dispatch.record.generation, 0);
        assert!(dispatch.record.workload_id.ends_with("-0"));
        assert_eq!(cluster.jobs_created(), 1);
    }

    #[tokio::test]
    async fn test_active_workload_is_attached_even_with_force() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        let first = dispatcher
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();
        cluster.set_phase(&first.record.workload_id, WorkloadPhase::Running, at(1));

        let second = dispatcher
            .dispatch(request(), DispatchOptions { force: true })
            .await
            .unwrap();

        assert_eq!(second.disposition, Disposition::Attached);
        assert_eq!(second.record.workload_id, first.record.workload_id);
        assert_eq!(cluster.jobs_created(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_requests_create_one_workload() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        let dispatcher = Arc::new(dispatcher);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    dispatcher
                        .dispatch(request(), DispatchOptions::default())
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().record.workload_id);
        }

        assert_eq!(cluster.jobs_created(), 1);
        assert_eq!(cluster.job_count(), 1);
        assert!(ids.iter().all(|id| id == &ids[0]));
    }

    /// A lookup that never sees existing workloads, as when another
    /// replica creates the same Job between our lookup and our create.
    struct StaleLookup(Arc<InMemoryCluster>);

    #[async_trait]
    impl SubmissionClient for StaleLookup {
        async fn create(&self, manifest: &RenderedManifest) -> Result<WorkloadRecord, ClusterError> {
            self.0.create(manifest).await
        }

        async fn find_by_fingerprint(
            &self,
            _fingerprint: &Fingerprint,
        ) -> Result<Option<WorkloadRecord>, ClusterError> {
            Ok(None)
        }

        async fn get(&self, workload_id: &str) -> Result<Option<WorkloadRecord>, ClusterError> {
            self.0.get(workload_id).await
        }

        async fn delete(&self, workload_id: &str) -> Result<(), ClusterError> {
            self.0.delete(workload_id).await
        }

        async fn delete_script(&self, workload_id: &str) -> Result<(), ClusterError> {
            self.0.delete_script(workload_id).await
        }

        async fn list_workloads(&self) -> Result<Vec<WorkloadRecord>, ClusterError> {
            self.0.list_workloads().await
        }

        async fn list_scripts(&self) -> Result<Vec<ScriptObject>, ClusterError> {
            self.0.list_scripts().await
        }

        async fn logs(&self, workload_id: &str) -> Result<Option<String>, ClusterError> {
            self.0.logs(workload_id).await
        }
    }

    #[tokio::test]
    async fn test_lost_create_race_attaches_to_winner() {
        let (cluster, winner) = setup(ReusePolicy::default());
        let first = winner
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();

        let loser = Dispatcher::new(
            Arc::new(StaleLookup(cluster.clone())),
            ManifestBuilder::new(settings()),
            ReusePolicy::default(),
            Duration::from_millis(5),
        );
        let second = loser
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();

        assert_eq!(second.disposition, Disposition::Attached);
        assert_eq!(second.record.workload_id, first.record.workload_id);
        assert_eq!(cluster.create_attempts(), 2);
        assert_eq!(cluster.jobs_created(), 1);
    }

    #[tokio::test]
    async fn test_collision_with_vanished_workload_is_transient() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        let id = Naming::default().workload_name(&request().fingerprint(), 0);
        cluster.inject_create_fault(ClusterError::AlreadyExists(id));

        let result = dispatcher.dispatch(request(), DispatchOptions::default()).await;

        assert!(matches!(result, Err(DispatchError::ClusterTransient(_))));
        assert_eq!(cluster.jobs_created(), 0);
    }

    #[tokio::test]
    async fn test_unstamped_failure_is_fresh_for_reuse() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        cluster.set_clock(at(0));
        let first = dispatcher
            .dispatch_at(request(), DispatchOptions::default(), at(0))
            .await
            .unwrap();
        cluster.fail_unstamped(&first.record.workload_id);

        let second = dispatcher
            .dispatch_at(request(), DispatchOptions::default(), at(23))
            .await
            .unwrap();

        assert_eq!(second.disposition, Disposition::Reused);
        assert_eq!(second.record.workload_id, first.record.workload_id);
        assert_eq!(cluster.jobs_created(), 1);
    }

    #[tokio::test]
    async fn test_result_only_for_succeeded_workloads() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        assert!(matches!(
            dispatcher.result("et-missing-0").await,
            Err(DispatchError::NotFound(_))
        ));

        let dispatch = dispatcher
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();
        let id = dispatch.record.workload_id.clone();
        assert!(matches!(
            dispatcher.result(&id).await,
            Err(DispatchError::NoResult {
                phase: WorkloadPhase::Pending,
                ..
            })
        ));

        cluster.set_phase(&id, WorkloadPhase::Succeeded, at(1));
        let artifact = dispatcher.result(&id).await.unwrap();
        assert_eq!(artifact.workload_id, id);
        assert_eq!(artifact.bucket.as_deref(), Some("models-bucket"));
        assert_eq!(
            artifact.model_path,
            format!("models/p1/{}/model.tar.gz", dispatch.record.fingerprint.data_hash)
        );
    }

    #[tokio::test]
    async fn test_succeeded_inside_window_is_reused_without_create() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        let first = dispatcher
            .dispatch_at(request(), DispatchOptions::default(), at(1))
            .await
            .unwrap();
        cluster.set_phase(&first.record.workload_id, WorkloadPhase::Succeeded, at(2));
        let attempts = cluster.create_attempts();

        let second = dispatcher
            .dispatch_at(
                request(),
                DispatchOptions::default(),
                at(2) + chrono::Duration::minutes(30),
            )
            .await
            .unwrap();

        assert_eq!(second.disposition, Disposition::Reused);
        assert_eq!(second.record.workload_id, first.record.workload_id);
        assert_eq!(cluster.create_attempts(), attempts);
    }

    #[tokio::test]
    async fn test_failed_past_window_submits_next_generation() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        let first = dispatcher
            .dispatch_at(request(), DispatchOptions::default(), at(1))
            .await
            .unwrap();
        cluster.fail(&first.record.workload_id, "DeadlineExceeded", at(2));

        let second = dispatcher
            .dispatch_at(request(), DispatchOptions::default(), at(4))
            .await
            .unwrap();

        assert_eq!(second.disposition, Disposition::Created);
        assert_eq!(second.record.generation, 1);
        assert_ne!(second.record.workload_id, first.record.workload_id);
        assert_eq!(cluster.jobs_created(), 2);
    }

    #[tokio::test]
    async fn test_failed_not_reused_when_disabled() {
        let (cluster, dispatcher) = setup(ReusePolicy {
            reuse_failed: false,
            ..ReusePolicy::default()
        });
        let first = dispatcher
            .dispatch_at(request(), DispatchOptions::default(), at(1))
            .await
            .unwrap();
        cluster.fail(&first.record.workload_id, "Error", at(2));

        let second = dispatcher
            .dispatch_at(
                request(),
                DispatchOptions::default(),
                at(2) + chrono::Duration::minutes(1),
            )
            .await
            .unwrap();

        assert_eq!(second.disposition, Disposition::Created);
        assert_eq!(second.record.generation, 1);
    }

    #[tokio::test]
    async fn test_force_resubmits_inside_window() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        let first = dispatcher
            .dispatch_at(request(), DispatchOptions::default(), at(1))
            .await
            .unwrap();
        cluster.set_phase(&first.record.workload_id, WorkloadPhase::Succeeded, at(2));

        let forced = dispatcher
            .dispatch_at(request(), DispatchOptions { force: true }, at(2))
            .await
            .unwrap();

        assert_eq!(forced.disposition, Disposition::Created);
        assert_eq!(forced.record.generation, 1);
    }

    #[tokio::test]
    async fn test_same_inputs_other_project_are_separate() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        let ours = dispatcher
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();
        let theirs = dispatcher
            .dispatch(
                TrainingRequest::new("p2", "print(1)", "s3://d/v1"),
                DispatchOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(theirs.disposition, Disposition::Created);
        assert_ne!(ours.record.workload_id, theirs.record.workload_id);
        assert_eq!(cluster.jobs_created(), 2);
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_cluster() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        cluster.inject_lookup_fault(ClusterError::Unauthorized("should not be hit".to_string()));

        let greedy = request().with_resources(ResourceProfile {
            cpu_millis: 64000,
            memory_mib: 1024,
        });
        let result = dispatcher.dispatch(greedy, DispatchOptions::default()).await;

        assert!(matches!(
            result,
            Err(DispatchError::Validation(
                ValidationError::ResourceCeilingExceeded { .. }
            ))
        ));
        assert_eq!(cluster.create_attempts(), 0);
    }

    #[tokio::test]
    async fn test_permanent_cluster_errors_map_to_dispatch_errors() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());

        cluster.inject_create_fault(ClusterError::QuotaExceeded("cpu".to_string()));
        assert!(matches!(
            dispatcher.dispatch(request(), DispatchOptions::default()).await,
            Err(DispatchError::QuotaExceeded(_))
        ));

        cluster.inject_lookup_fault(ClusterError::Unauthorized("forbidden".to_string()));
        assert!(matches!(
            dispatcher.dispatch(request(), DispatchOptions::default()).await,
            Err(DispatchError::ClusterAuthorization(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_returns_once_terminal() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        let dispatch = dispatcher
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();
        let id = dispatch.record.workload_id.clone();

        let finisher = {
            let cluster = Arc::clone(&cluster);
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cluster.set_phase(&id, WorkloadPhase::Succeeded, Utc::now());
            })
        };

        let outcome = dispatcher
            .wait(&id, Some(Duration::from_secs(5)), &CancellationToken::new())
            .await
            .unwrap();
        finisher.await.unwrap();

        assert!(matches!(outcome, WaitOutcome::Finished(_)));
        assert_eq!(outcome.record().phase, WorkloadPhase::Succeeded);
    }

    #[tokio::test]
    async fn test_wait_detaches_without_touching_workload() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        let dispatch = dispatcher
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();
        let id = dispatch.record.workload_id;

        let timed_out = dispatcher
            .wait(&id, Some(Duration::from_millis(15)), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(timed_out, WaitOutcome::Detached(_)));

        let token = CancellationToken::new();
        token.cancel();
        let cancelled = dispatcher.wait(&id, None, &token).await.unwrap();
        assert!(matches!(cancelled, WaitOutcome::Detached(_)));

        assert!(cluster.has_workload(&id));
        assert!(cluster.has_script(&id));
    }

    #[tokio::test]
    async fn test_cancel_only_stops_active_workloads() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        let dispatch = dispatcher
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();
        let id = dispatch.record.workload_id;

        assert!(dispatcher.cancel(&id).await.unwrap());
        assert!(!cluster.has_workload(&id));
        assert!(!cluster.has_script(&id));
        assert!(matches!(
            dispatcher.cancel(&id).await,
            Err(DispatchError::NotFound(_))
        ));

        let again = dispatcher
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();
        cluster.set_phase(&again.record.workload_id, WorkloadPhase::Failed, at(1));
        assert!(!dispatcher.cancel(&again.record.workload_id).await.unwrap());
        assert!(cluster.has_workload(&again.record.workload_id));
    }

    #[tokio::test]
    async fn test_logs_require_known_workload() {
        let (cluster, dispatcher) = setup(ReusePolicy::default());
        assert!(matches!(
            dispatcher.logs("et-missing-0").await,
            Err(DispatchError::NotFound(_))
        ));

        let dispatch = dispatcher
            .dispatch(request(), DispatchOptions::default())
            .await
            .unwrap();
        assert_eq!(dispatcher.logs(&dispatch.record.workload_id).await.unwrap(), None);

        cluster.set_logs(&dispatch.record.workload_id, "loss=0.1\n");
        assert_eq!(
            dispatcher
                .logs(&dispatch.record.workload_id)
                .await
                .unwrap()
                .as_deref(),
            Some("loss=0.1\n")
        );
    }

    #[test]
    fn test_reuse_window_boundaries() {
        let policy = ReusePolicy::default();
        let mut record = WorkloadRecord {
            fingerprint: request().fingerprint(),
            workload_id: "et-x-0".to_string(),
            generation: 0,
            phase: WorkloadPhase::Running,
            created_at: at(0),
            terminal_at: None,
            detail: None,
        };
        assert!(!policy.allows(&record, at(1)));

        record.phase = WorkloadPhase::Succeeded;
        record.terminal_at = Some(at(1));
        assert!(policy.allows(&record, at(1) + chrono::Duration::minutes(59)));
        assert!(!policy.allows(&record, at(2)));
    }
}
