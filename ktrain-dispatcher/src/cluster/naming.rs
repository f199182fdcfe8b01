//! Object names and labels
//!
//! Workload names are derived from the fingerprint so that the cluster's
//! name uniqueness doubles as the dedup lock: two dispatchers racing on the
//! same inputs race on the same name, and exactly one create wins.

use std::collections::BTreeMap;

use ktrain_core::domain::Fingerprint;
use ktrain_core::validation::{MAX_LABEL_VALUE_LENGTH, is_dns_label, is_dns_subdomain, is_label_value};

/// Standard label naming the tool that manages an object.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Longest accepted name prefix; keeps `<prefix>-<hash>-<generation>`
/// within the 63 character limit for generations below 10^7.
pub const MAX_NAME_PREFIX_LENGTH: usize = 6;

const SCRIPT_SUFFIX: &str = "-script";

/// Naming scheme shared by every object the dispatcher creates
#[derive(Debug, Clone)]
pub struct Naming {
    pub name_prefix: String,
    pub label_prefix: String,
    pub manager: String,
}

impl Naming {
    pub fn new(
        name_prefix: impl Into<String>,
        label_prefix: impl Into<String>,
        manager: impl Into<String>,
    ) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            label_prefix: label_prefix.into(),
            manager: manager.into(),
        }
    }

    /// Validates the prefixes against Kubernetes name and label grammars
    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_dns_label(&self.name_prefix) || self.name_prefix.len() > MAX_NAME_PREFIX_LENGTH {
            anyhow::bail!(
                "name prefix '{}' must be a DNS label of at most {} characters",
                self.name_prefix,
                MAX_NAME_PREFIX_LENGTH
            );
        }

        if !is_dns_subdomain(&self.label_prefix) {
            anyhow::bail!("label prefix '{}' must be a DNS subdomain", self.label_prefix);
        }

        if self.manager.len() > MAX_LABEL_VALUE_LENGTH || !is_label_value(&self.manager) {
            anyhow::bail!("manager '{}' must be a valid label value", self.manager);
        }

        Ok(())
    }

    /// `<prefix>-<data_hash>-<generation>`
    pub fn workload_name(&self, fingerprint: &Fingerprint, generation: u32) -> String {
        format!(
            "{}-{}-{}",
            self.name_prefix, fingerprint.data_hash, generation
        )
    }

    /// Name of the ConfigMap carrying a workload's script.
    pub fn script_name(workload_id: &str) -> String {
        format!("{workload_id}{SCRIPT_SUFFIX}")
    }

    pub fn project_label(&self) -> String {
        format!("{}/project-id", self.label_prefix)
    }

    pub fn data_hash_label(&self) -> String {
        format!("{}/data-hash", self.label_prefix)
    }

    pub fn generation_label(&self) -> String {
        format!("{}/generation", self.label_prefix)
    }

    pub fn workload_label(&self) -> String {
        format!("{}/workload", self.label_prefix)
    }

    pub fn data_reference_annotation(&self) -> String {
        format!("{}/data-reference", self.label_prefix)
    }

    /// Labels stamped on the workload, its pod template and its script.
    pub fn labels(&self, fingerprint: &Fingerprint, generation: u32) -> BTreeMap<String, String> {
        BTreeMap::from([
            (self.project_label(), fingerprint.project_id.clone()),
            (self.data_hash_label(), fingerprint.data_hash.clone()),
            (self.generation_label(), generation.to_string()),
            (MANAGED_BY_LABEL.to_string(), self.manager.clone()),
        ])
    }

    /// Selector matching both fingerprint labels at once.
    pub fn fingerprint_selector(&self, fingerprint: &Fingerprint) -> String {
        format!(
            "{}={},{}={},{}",
            self.project_label(),
            fingerprint.project_id,
            self.data_hash_label(),
            fingerprint.data_hash,
            self.managed_selector()
        )
    }

    /// Selector matching everything this dispatcher manages.
    pub fn managed_selector(&self) -> String {
        format!("{}={}", MANAGED_BY_LABEL, self.manager)
    }

    /// Read the fingerprint and generation back from object labels.
    pub fn parse_labels(&self, labels: &BTreeMap<String, String>) -> Option<(Fingerprint, u32)> {
        let project_id = labels.get(&self.project_label())?;
        let data_hash = labels.get(&self.data_hash_label())?;
        let generation = labels
            .get(&self.generation_label())
            .and_then(|g| g.parse().ok())
            .unwrap_or(0);

        Some((
            Fingerprint {
                project_id: project_id.clone(),
                data_hash: data_hash.clone(),
            },
            generation,
        ))
    }

    /// True when every `key=value` term of `selector` is present in `labels`.
    pub fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
        selector
            .split(',')
            .filter(|term| !term.is_empty())
            .all(|term| match term.split_once('=') {
                Some((key, value)) => labels.get(key).is_some_and(|v| v == value),
                None => false,
            })
    }
}

impl Default for Naming {
    fn default() -> Self {
        Self::new("et", "et", "ktrain-dispatcher")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ktrain_core::domain::fingerprint::DATA_HASH_LEN;

    fn fp(project: &str) -> Fingerprint {
        Fingerprint::compute(project, b"print(1)", "s3://d/v1")
    }

    #[test]
    fn test_workload_name_is_deterministic_dns_label() {
        let naming = Naming::default();
        let name = naming.workload_name(&fp("p1"), 0);
        assert_eq!(name, naming.workload_name(&fp("p1"), 0));
        assert!(name.starts_with("et-"));
        assert!(name.ends_with("-0"));
        assert!(is_dns_label(&name));
    }

    #[test]
    fn test_longest_name_fits_label_limit() {
        let naming = Naming::new("abcdef", "et", "ktrain");
        let name = naming.workload_name(&fp("p1"), 9_999_999);
        assert_eq!(name.len(), MAX_NAME_PREFIX_LENGTH + DATA_HASH_LEN + 2 + 7);
        assert!(is_dns_label(&name));
    }

    #[test]
    fn test_labels_round_trip() {
        let naming = Naming::default();
        let labels = naming.labels(&fp("p1"), 3);
        assert_eq!(labels.get("et/project-id").map(String::as_str), Some("p1"));
        assert_eq!(naming.parse_labels(&labels), Some((fp("p1"), 3)));
    }

    #[test]
    fn test_fingerprint_selector_requires_both_labels() {
        let naming = Naming::default();
        let selector = naming.fingerprint_selector(&fp("p1"));

        assert!(Naming::selector_matches(&selector, &naming.labels(&fp("p1"), 0)));

        // Same data hash under a different project must not match.
        let mut other_project = naming.labels(&fp("p1"), 0);
        other_project.insert(naming.project_label(), "p2".to_string());
        assert!(!Naming::selector_matches(&selector, &other_project));
    }

    #[test]
    fn test_validate() {
        assert!(Naming::default().validate().is_ok());
        assert!(Naming::new("toolong", "et", "m").validate().is_err());
        assert!(Naming::new("Et", "et", "m").validate().is_err());
        assert!(Naming::new("et", "bad prefix", "m").validate().is_err());
        assert!(Naming::new("et", "et", "-m").validate().is_err());
    }
}
