//! Lifecycle Reconciler
//!
//! Periodically walks every managed workload and cleans up after it:
//! script ConfigMaps go as soon as a workload is terminal, the Job itself
//! goes once the retention window has passed, and script objects whose
//! workload never materialised are swept after a grace period.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ktrain_core::domain::WorkloadPhase;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cluster::{ClusterError, SubmissionClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSettings {
    pub interval: Duration,
    /// How long a terminal Job is kept after finishing.
    pub retention: Duration,
    /// Minimum age of a script object with no workload before it is removed.
    pub orphan_grace: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            retention: Duration::from_secs(86400),
            orphan_grace: Duration::from_secs(600),
        }
    }
}

/// What one pass observed and changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub observed: usize,
    /// `(workload_id, from, to)`; `from` is `None` the first time a
    /// workload is seen.
    pub transitions: Vec<(String, Option<WorkloadPhase>, WorkloadPhase)>,
    pub scripts_released: Vec<String>,
    pub workloads_evicted: Vec<String>,
    pub orphans_swept: Vec<String>,
}

impl ReconcileReport {
    pub fn is_quiet(&self) -> bool {
        self.transitions.is_empty()
            && self.scripts_released.is_empty()
            && self.workloads_evicted.is_empty()
            && self.orphans_swept.is_empty()
    }
}

pub struct Reconciler {
    cluster: Arc<dyn SubmissionClient>,
    settings: ReconcileSettings,
    /// Last phase seen per workload; owned by the reconciler task.
    phases: HashMap<String, WorkloadPhase>,
    /// First pass that saw each workload terminal, for records the cluster
    /// has not stamped with a terminal time yet.
    terminal_seen: HashMap<String, DateTime<Utc>>,
}

impl Reconciler {
    pub fn new(cluster: Arc<dyn SubmissionClient>, settings: ReconcileSettings) -> Self {
        Self {
            cluster,
            settings,
            phases: HashMap::new(),
            terminal_seen: HashMap::new(),
        }
    }

    /// Run passes on the configured interval until `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            "Starting lifecycle reconciler (interval: {:?}, retention: {:?})",
            self.settings.interval, self.settings.retention
        );

        let mut interval = time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Lifecycle reconciler stopped");
                    return;
                }
                _ = interval.tick() => {}
            }

            match self.reconcile_at(Utc::now()).await {
                Ok(report) if !report.is_quiet() => info!(
                    "Reconcile pass: {} workload(s), {} transition(s), {} script(s) released, {} evicted, {} orphan(s) swept",
                    report.observed,
                    report.transitions.len(),
                    report.scripts_released.len(),
                    report.workloads_evicted.len(),
                    report.orphans_swept.len()
                ),
                Ok(report) => debug!("Reconcile pass: {} workload(s), no changes", report.observed),
                Err(e) => error!("Reconcile pass failed: {}", e),
            }
        }
    }

    /// One reconcile pass as of `now`.
    pub async fn reconcile_at(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<ReconcileReport, ClusterError> {
        let workloads = self.cluster.list_workloads().await?;
        let mut report = ReconcileReport {
            observed: workloads.len(),
            ..Default::default()
        };
        let mut live = HashSet::new();

        for record in &workloads {
            let id = record.workload_id.as_str();
            live.insert(id.to_string());

            let previous = self.phases.insert(id.to_string(), record.phase);
            if previous != Some(record.phase) {
                match &record.detail {
                    Some(detail) => info!("Workload {} is {} ({})", id, record.phase, detail),
                    None => info!("Workload {} is {}", id, record.phase),
                }
                report
                    .transitions
                    .push((id.to_string(), previous, record.phase));
            }

            if record.phase.is_active() {
                continue;
            }
            let seen = *self.terminal_seen.entry(id.to_string()).or_insert(now);
            let Some(finished) = record.finished_at(seen) else {
                continue;
            };

            if elapsed(now, finished) >= self.settings.retention {
                match self.cluster.delete(id).await {
                    Ok(()) | Err(ClusterError::NotFound(_)) => {
                        info!("Evicted workload {} past retention", id);
                        report.workloads_evicted.push(id.to_string());
                        live.remove(id);
                        self.phases.remove(id);
                        self.terminal_seen.remove(id);
                    }
                    Err(e) => warn!("Failed to evict workload {}: {}", id, e),
                }
            }
        }

        for script in self.cluster.list_scripts().await? {
            let owner = workloads
                .iter()
                .find(|record| record.workload_id == script.workload_id);

            match owner {
                Some(record) if live.contains(&record.workload_id) => {
                    if record.phase.is_terminal() {
                        self.release(&script.workload_id, &mut report.scripts_released)
                            .await;
                    }
                }
                // Owner just evicted in this pass.
                Some(_) => {
                    self.release(&script.workload_id, &mut report.scripts_released)
                        .await
                }
                None if elapsed(now, script.created_at) >= self.settings.orphan_grace => {
                    if self.owner_appeared(&script.workload_id).await {
                        continue;
                    }
                    self.release(&script.workload_id, &mut report.orphans_swept)
                        .await
                }
                None => {}
            }
        }

        self.phases.retain(|id, _| live.contains(id));
        self.terminal_seen.retain(|id, _| live.contains(id));

        Ok(report)
    }

    /// Re-read a script's owner right before sweeping it: the workload may
    /// have been created after this pass listed workloads.
    async fn owner_appeared(&self, workload_id: &str) -> bool {
        match self.cluster.get(workload_id).await {
            Ok(None) => false,
            Ok(Some(_)) => {
                debug!("Workload {} appeared during the pass, keeping its script", workload_id);
                true
            }
            Err(e) => {
                warn!("Failed to re-check owner of script {}: {}", workload_id, e);
                true
            }
        }
    }

    async fn release(&self, workload_id: &str, released: &mut Vec<String>) {
        match self.cluster.delete_script(workload_id).await {
            Ok(()) | Err(ClusterError::NotFound(_)) => {
                debug!("Released script of {}", workload_id);
                released.push(workload_id.to_string());
            }
            Err(e) => warn!("Failed to release script of {}: {}", workload_id, e),
        }
    }
}

fn elapsed(now: DateTime<Utc>, since: DateTime<Utc>) -> Duration {
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
