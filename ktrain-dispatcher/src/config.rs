//! Dispatcher configuration
//!
//! Every setting comes from a `KTRAIN_*` environment variable with a
//! default. Parsing goes through a lookup function so tests can feed values
//! without touching the process environment.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use ktrain_core::domain::{CredentialRef, ResourceProfile};

use crate::cluster::{Naming, RetryPolicy};
use crate::manifest::{ManifestSettings, StorageSettings};
use crate::service::dispatcher::ReusePolicy;
use crate::service::reconciler::ReconcileSettings;

const ENV_PREFIX: &str = "KTRAIN_";

/// Which cluster the dispatcher submits to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterBackend {
    Kube,
    /// In-process cluster for local development.
    Memory,
}

impl FromStr for ClusterBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kube" | "kubernetes" => Ok(Self::Kube),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown cluster backend '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API listens on
    pub bind_addr: String,

    /// Bearer token required on every endpoint but `/health`
    pub auth_token: Option<String>,

    pub backend: ClusterBackend,

    pub manifest: ManifestSettings,

    pub reuse: ReusePolicy,

    pub reconcile: ReconcileSettings,

    /// Upper bound on a single Kubernetes API call
    pub api_timeout: Duration,

    pub retry: RetryPolicy,

    /// How often waiters re-read workload status
    pub wait_poll_interval: Duration,
}

impl Config {
    /// Loads configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `lookup`, which maps a full variable name
    /// (e.g. `KTRAIN_NAMESPACE`) to its value.
    ///
    /// Recognised variables, all optional:
    /// - BIND_ADDR (default: 0.0.0.0:8080), AUTH_TOKEN
    /// - CLUSTER_BACKEND (kube | memory, default: kube), NAMESPACE (default: external-training)
    /// - IMAGE, RUNTIME_COMMAND, SCRIPT_FILE, RUN_AS_USER
    /// - NAME_PREFIX, LABEL_PREFIX, MANAGED_BY
    /// - CREDENTIAL_SECRET, PULL_SECRET
    /// - DEFAULT_CPU_MILLIS, DEFAULT_MEMORY_MIB, MAX_CPU_MILLIS, MAX_MEMORY_MIB
    /// - ACTIVE_DEADLINE (seconds, 0 disables)
    /// - STORAGE_BUCKET, STORAGE_ENDPOINT, STORAGE_REGION, OUTPUT_PREFIX, CACHE_PREFIX
    /// - REUSE_WINDOW, REUSE_FAILED, RETENTION, RECONCILE_INTERVAL, ORPHAN_GRACE (seconds)
    /// - API_TIMEOUT (seconds), RETRY_MAX_ATTEMPTS, RETRY_INITIAL_MS, RETRY_MAX_MS
    /// - WAIT_POLL_INTERVAL (seconds)
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let naming = Naming::new(
            env.string("NAME_PREFIX", "et"),
            env.string("LABEL_PREFIX", "et"),
            env.string("MANAGED_BY", "ktrain-dispatcher"),
        );

        let credential_secret = env.string("CREDENTIAL_SECRET", "storage-credentials");
        let default_credentials = CredentialRef::parse(&credential_secret)
            .with_context(|| format!("Invalid {ENV_PREFIX}CREDENTIAL_SECRET"))?;

        let runtime_command = env
            .string("RUNTIME_COMMAND", "python3")
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let active_deadline: i64 = env.parse("ACTIVE_DEADLINE", 21600)?;

        let manifest = ManifestSettings {
            namespace: env.string("NAMESPACE", "external-training"),
            naming,
            image: env.string("IMAGE", "python:3.12-slim"),
            runtime_command,
            script_file: env.string("SCRIPT_FILE", "train.py"),
            run_as_user: env.parse("RUN_AS_USER", 10001)?,
            default_resources: ResourceProfile {
                cpu_millis: env.parse("DEFAULT_CPU_MILLIS", 1000)?,
                memory_mib: env.parse("DEFAULT_MEMORY_MIB", 2048)?,
            },
            max_resources: ResourceProfile {
                cpu_millis: env.parse("MAX_CPU_MILLIS", 16000)?,
                memory_mib: env.parse("MAX_MEMORY_MIB", 65536)?,
            },
            default_credentials,
            pull_secret: env.optional("PULL_SECRET"),
            active_deadline_secs: (active_deadline > 0).then_some(active_deadline),
            storage: StorageSettings {
                bucket: env.optional("STORAGE_BUCKET"),
                endpoint: env.optional("STORAGE_ENDPOINT"),
                region: env.optional("STORAGE_REGION"),
                output_prefix: env.string("OUTPUT_PREFIX", "models"),
                cache_prefix: env.optional("CACHE_PREFIX"),
            },
        };

        Ok(Self {
            bind_addr: env.string("BIND_ADDR", "0.0.0.0:8080"),
            auth_token: env.optional("AUTH_TOKEN"),
            backend: env.parse("CLUSTER_BACKEND", ClusterBackend::Kube)?,
            manifest,
            reuse: ReusePolicy {
                window: env.seconds("REUSE_WINDOW", 3600)?,
                reuse_failed: env.parse("REUSE_FAILED", true)?,
            },
            reconcile: ReconcileSettings {
                interval: env.seconds("RECONCILE_INTERVAL", 30)?,
                retention: env.seconds("RETENTION", 86400)?,
                orphan_grace: env.seconds("ORPHAN_GRACE", 600)?,
            },
            api_timeout: env.seconds("API_TIMEOUT", 10)?,
            retry: RetryPolicy {
                max_attempts: env.parse("RETRY_MAX_ATTEMPTS", 5)?,
                initial_delay: Duration::from_millis(env.parse("RETRY_INITIAL_MS", 200)?),
                max_delay: Duration::from_millis(env.parse("RETRY_MAX_MS", 5000)?),
            },
            wait_poll_interval: env.seconds("WAIT_POLL_INTERVAL", 2)?,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if matches!(&self.auth_token, Some(token) if token.trim().is_empty()) {
            anyhow::bail!("auth_token cannot be blank");
        }

        self.manifest
            .validate()
            .context("Invalid workload settings")?;

        if self.reconcile.interval.is_zero() {
            anyhow::bail!("reconcile interval must be greater than 0");
        }

        if self.reconcile.retention < self.reuse.window {
            anyhow::bail!(
                "retention ({:?}) must be at least the reuse window ({:?})",
                self.reconcile.retention,
                self.reuse.window
            );
        }

        if self.api_timeout.is_zero() {
            anyhow::bail!("api_timeout must be greater than 0");
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry max attempts must be at least 1");
        }

        if self.retry.initial_delay > self.retry.max_delay {
            anyhow::bail!("retry initial delay cannot exceed the maximum delay");
        }

        if self.wait_poll_interval.is_zero() {
            anyhow::bail!("wait poll interval must be greater than 0");
        }

        Ok(())
    }
}

/// Lookup of `KTRAIN_`-prefixed variables
struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{key}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid {ENV_PREFIX}{key} '{raw}': {e}")),
            None => Ok(default),
        }
    }

    fn seconds(&self, key: &str, default: u64) -> anyhow::Result<Duration> {
        self.parse(key, default).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn defaults() -> Config {
        Config::from_lookup(|_| None).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = defaults();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.backend, ClusterBackend::Kube);
        assert_eq!(config.manifest.namespace, "external-training");
        assert_eq!(config.manifest.runtime_command, vec!["python3"]);
        assert_eq!(config.manifest.active_deadline_secs, Some(21600));
        assert_eq!(config.reuse.window, Duration::from_secs(3600));
        assert!(config.reuse.reuse_failed);
        assert_eq!(config.reconcile.retention, Duration::from_secs(86400));
        assert_eq!(config.api_timeout, Duration::from_secs(10));
        assert!(config.auth_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("KTRAIN_CLUSTER_BACKEND", "memory"),
            ("KTRAIN_NAMESPACE", "ml-jobs"),
            ("KTRAIN_RUNTIME_COMMAND", "python3 -u"),
            ("KTRAIN_REUSE_FAILED", "false"),
            ("KTRAIN_ACTIVE_DEADLINE", "0"),
            ("KTRAIN_AUTH_TOKEN", " secret "),
            ("KTRAIN_STORAGE_BUCKET", "models"),
        ]))
        .unwrap();

        assert_eq!(config.backend, ClusterBackend::Memory);
        assert_eq!(config.manifest.namespace, "ml-jobs");
        assert_eq!(config.manifest.runtime_command, vec!["python3", "-u"]);
        assert!(!config.reuse.reuse_failed);
        assert_eq!(config.manifest.active_deadline_secs, None);
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.manifest.storage.bucket.as_deref(), Some("models"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unparseable_values_are_errors() {
        assert!(Config::from_lookup(lookup_from(&[("KTRAIN_RETENTION", "a day")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("KTRAIN_CLUSTER_BACKEND", "nomad")])).is_err());
        assert!(
            Config::from_lookup(lookup_from(&[("KTRAIN_CREDENTIAL_SECRET", "Bad Name")])).is_err()
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = defaults();
        assert!(config.validate().is_ok());

        // Retention shorter than the reuse window would evict reusable results
        config.reconcile.retention = Duration::from_secs(60);
        assert!(config.validate().is_err());
        config.reconcile.retention = Duration::from_secs(86400);

        config.manifest.naming.name_prefix = "much-too-long".to_string();
        assert!(config.validate().is_err());
        config.manifest.naming.name_prefix = "et".to_string();

        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
        config.retry.max_attempts = 5;

        config.manifest.max_resources.cpu_millis = 500;
        assert!(config.validate().is_err());
    }
}
