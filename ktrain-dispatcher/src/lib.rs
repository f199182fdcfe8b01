//! Deduplicating training-job dispatcher
//!
//! Accepts training requests, fingerprints them, and submits at most one
//! Kubernetes Job per fingerprint at a time. The cluster is the only store
//! of workload state.

pub mod api;
pub mod cluster;
pub mod config;
pub mod error;
pub mod manifest;
pub mod service;

use std::sync::Arc;

use cluster::{InMemoryCluster, KubeSubmissionClient, SubmissionClient};
use config::{ClusterBackend, Config};

/// Build the submission client selected by the configuration.
pub async fn connect_cluster(config: &Config) -> anyhow::Result<Arc<dyn SubmissionClient>> {
    let naming = config.manifest.naming.clone();

    let cluster: Arc<dyn SubmissionClient> = match config.backend {
        ClusterBackend::Kube => Arc::new(
            KubeSubmissionClient::connect(
                &config.manifest.namespace,
                naming,
                config.retry,
                config.api_timeout,
            )
            .await?,
        ),
        ClusterBackend::Memory => {
            tracing::warn!("Using the in-memory cluster; workloads never run");
            Arc::new(InMemoryCluster::new(naming).with_retry(config.retry))
        }
    };

    Ok(cluster)
}
