//! In-memory cluster
//!
//! A single-process stand-in for the workload API. Creates are atomic on the
//! object name exactly like the API server, so dedup races behave the same
//! way they do against a real cluster. Used by `KTRAIN_CLUSTER_BACKEND=memory`
//! and as the test double throughout the crate.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ktrain_core::domain::{Fingerprint, WorkloadPhase, WorkloadRecord};

use super::retry::{RetryPolicy, with_backoff};
use super::{ClusterError, Naming, ScriptObject, SubmissionClient, latest_generation, record_from_job};
use crate::manifest::RenderedManifest;

#[derive(Debug, Clone)]
struct StoredJob {
    labels: BTreeMap<String, String>,
    record: WorkloadRecord,
}

#[derive(Debug, Default)]
struct State {
    jobs: BTreeMap<String, StoredJob>,
    scripts: BTreeMap<String, ScriptObject>,
    logs: HashMap<String, String>,
    create_faults: VecDeque<ClusterError>,
    lookup_faults: VecDeque<ClusterError>,
    clock: Option<DateTime<Utc>>,
    create_attempts: usize,
    jobs_created: usize,
}

impl State {
    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }
}

pub struct InMemoryCluster {
    naming: Naming,
    retry: RetryPolicy,
    state: Mutex<State>,
}

impl InMemoryCluster {
    pub fn new(naming: Naming) -> Self {
        Self {
            naming,
            retry: RetryPolicy::default(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pin the timestamp given to newly created objects.
    pub fn set_clock(&self, at: DateTime<Utc>) {
        self.state().clock = Some(at);
    }

    /// Move a workload to `phase`, as the Job controller would.
    pub fn set_phase(&self, workload_id: &str, phase: WorkloadPhase, at: DateTime<Utc>) -> bool {
        self.transition(workload_id, phase, at, None)
    }

    /// Fail a workload with a reason, as an exceeded deadline would.
    pub fn fail(&self, workload_id: &str, detail: &str, at: DateTime<Utc>) -> bool {
        self.transition(workload_id, WorkloadPhase::Failed, at, Some(detail.to_string()))
    }

    /// Fail a workload without a terminal time, as the Job controller
    /// reports a failed pod before it posts the `Failed` condition.
    pub fn fail_unstamped(&self, workload_id: &str) -> bool {
        let failed = self.transition(workload_id, WorkloadPhase::Failed, Utc::now(), None);
        if let Some(job) = self.state().jobs.get_mut(workload_id) {
            job.record.terminal_at = None;
        }
        failed
    }

    fn transition(
        &self,
        workload_id: &str,
        phase: WorkloadPhase,
        at: DateTime<Utc>,
        detail: Option<String>,
    ) -> bool {
        let mut state = self.state();
        let Some(job) = state.jobs.get_mut(workload_id) else {
            return false;
        };
        job.record.phase = phase;
        job.record.terminal_at = phase.is_terminal().then_some(at);
        job.record.detail = detail;
        true
    }

    pub fn set_logs(&self, workload_id: &str, text: &str) {
        self.state()
            .logs
            .insert(workload_id.to_string(), text.to_string());
    }

    /// Fail the next create attempt with `err`.
    pub fn inject_create_fault(&self, err: ClusterError) {
        self.state().create_faults.push_back(err);
    }

    /// Fail the next lookup (find, get or list) with `err`.
    pub fn inject_lookup_fault(&self, err: ClusterError) {
        self.state().lookup_faults.push_back(err);
    }

    /// Create calls that reached the cluster, including failed ones.
    pub fn create_attempts(&self) -> usize {
        self.state().create_attempts
    }

    /// Creates that produced a new workload.
    pub fn jobs_created(&self) -> usize {
        self.state().jobs_created
    }

    pub fn job_count(&self) -> usize {
        self.state().jobs.len()
    }

    pub fn script_count(&self) -> usize {
        self.state().scripts.len()
    }

    pub fn has_workload(&self, workload_id: &str) -> bool {
        self.state().jobs.contains_key(workload_id)
    }

    pub fn has_script(&self, workload_id: &str) -> bool {
        self.state()
            .scripts
            .contains_key(&Naming::script_name(workload_id))
    }

    fn lookup_fault(&self) -> Result<(), ClusterError> {
        match self.state().lookup_faults.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn try_create(&self, manifest: &RenderedManifest) -> Result<WorkloadRecord, ClusterError> {
        let mut state = self.state();
        state.create_attempts += 1;

        if let Some(err) = state.create_faults.pop_front() {
            return Err(err);
        }

        let now = state.now();
        let script_name = Naming::script_name(&manifest.workload_id);
        state
            .scripts
            .entry(script_name.clone())
            .or_insert_with(|| ScriptObject {
                name: script_name,
                workload_id: manifest.workload_id.clone(),
                created_at: now,
            });

        if state.jobs.contains_key(&manifest.workload_id) {
            return Err(ClusterError::AlreadyExists(manifest.workload_id.clone()));
        }

        let mut record = record_from_job(&self.naming, &manifest.job).ok_or_else(|| {
            ClusterError::Rejected(format!(
                "workload {} has no fingerprint labels",
                manifest.workload_id
            ))
        })?;
        record.created_at = now;

        let labels = manifest.job.metadata.labels.clone().unwrap_or_default();
        state.jobs.insert(
            manifest.workload_id.clone(),
            StoredJob {
                labels,
                record: record.clone(),
            },
        );
        state.jobs_created += 1;

        Ok(record)
    }

    fn select(&self, selector: &str) -> Result<Vec<WorkloadRecord>, ClusterError> {
        self.lookup_fault()?;
        Ok(self
            .state()
            .jobs
            .values()
            .filter(|job| Naming::selector_matches(selector, &job.labels))
            .map(|job| job.record.clone())
            .collect())
    }
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new(Naming::default())
    }
}

#[async_trait]
impl SubmissionClient for InMemoryCluster {
    async fn create(&self, manifest: &RenderedManifest) -> Result<WorkloadRecord, ClusterError> {
        // Let concurrent submitters interleave between lookup and create.
        tokio::task::yield_now().await;
        with_backoff(&self.retry, "create workload", move || async move {
            self.try_create(manifest)
        })
        .await
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<WorkloadRecord>, ClusterError> {
        let selector = self.naming.fingerprint_selector(fingerprint);
        let selector = selector.as_str();
        let matches = with_backoff(&self.retry, "find workload", move || async move {
            self.select(selector)
        })
        .await?;
        Ok(latest_generation(matches))
    }

    async fn get(&self, workload_id: &str) -> Result<Option<WorkloadRecord>, ClusterError> {
        with_backoff(&self.retry, "get workload", move || async move {
            self.lookup_fault()?;
            Ok(self
                .state()
                .jobs
                .get(workload_id)
                .map(|job| job.record.clone()))
        })
        .await
    }

    async fn delete(&self, workload_id: &str) -> Result<(), ClusterError> {
        let mut state = self.state();
        state.logs.remove(workload_id);
        match state.jobs.remove(workload_id) {
            Some(_) => Ok(()),
            None => Err(ClusterError::NotFound(workload_id.to_string())),
        }
    }

    async fn delete_script(&self, workload_id: &str) -> Result<(), ClusterError> {
        let name = Naming::script_name(workload_id);
        match self.state().scripts.remove(&name) {
            Some(_) => Ok(()),
            None => Err(ClusterError::NotFound(name)),
        }
    }

    async fn list_workloads(&self) -> Result<Vec<WorkloadRecord>, ClusterError> {
        let selector = self.naming.managed_selector();
        let selector = selector.as_str();
        with_backoff(&self.retry, "list workloads", move || async move {
            self.select(selector)
        })
        .await
    }

    async fn list_scripts(&self) -> Result<Vec<ScriptObject>, ClusterError> {
        Ok(self.state().scripts.values().cloned().collect())
    }

    async fn logs(&self, workload_id: &str) -> Result<Option<String>, ClusterError> {
        Ok(self.state().logs.get(workload_id).cloned())
    }
}
