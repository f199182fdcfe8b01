//! Workload domain types
//!
//! A workload is the cluster object executing one training run. The
//! dispatcher never stores these records itself; they are read back from
//! the cluster, which is the system of record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;

/// Lifecycle phase of a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl WorkloadPhase {
    /// Succeeded or Failed; no further transitions happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Pending or Running.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for WorkloadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Observed state of one workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    pub fingerprint: Fingerprint,
    pub workload_id: String,
    /// Incremented each time a terminal fingerprint is resubmitted.
    pub generation: u32,
    pub phase: WorkloadPhase,
    pub created_at: DateTime<Utc>,
    pub terminal_at: Option<DateTime<Utc>>,
    /// Failure reason reported by the cluster, if any.
    pub detail: Option<String>,
}

impl WorkloadRecord {
    /// When the workload became terminal.
    ///
    /// The cluster can report a failed pod before it stamps a transition
    /// time; such a record counts as finished at `observed_at`, the moment
    /// the caller first saw it terminal.
    pub fn finished_at(&self, observed_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.phase.is_terminal() {
            Some(self.terminal_at.unwrap_or(observed_at))
        } else {
            None
        }
    }
}

/// How a dispatch request was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// A new workload was submitted.
    Created,
    /// An in-flight (or concurrently created) workload was joined.
    Attached,
    /// A terminal result inside the reuse window was returned.
    Reused,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(phase: WorkloadPhase, terminal_at: Option<DateTime<Utc>>) -> WorkloadRecord {
        WorkloadRecord {
            fingerprint: Fingerprint {
                project_id: "p1".to_string(),
                data_hash: "abc".to_string(),
            },
            workload_id: "et-abc-0".to_string(),
            generation: 0,
            phase,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            terminal_at,
            detail: None,
        }
    }

    #[test]
    fn test_phase_classification() {
        assert!(WorkloadPhase::Pending.is_active());
        assert!(WorkloadPhase::Running.is_active());
        assert!(WorkloadPhase::Succeeded.is_terminal());
        assert!(WorkloadPhase::Failed.is_terminal());
    }

    #[test]
    fn test_finished_at() {
        let done = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();
        let seen = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(record(WorkloadPhase::Running, None).finished_at(seen), None);
        assert_eq!(
            record(WorkloadPhase::Succeeded, Some(done)).finished_at(seen),
            Some(done)
        );
    }

    #[test]
    fn test_unstamped_failure_finishes_when_observed() {
        // Created a day before the failure was noticed; the creation time
        // must not stand in for the missing terminal time.
        let seen = Utc.with_ymd_and_hms(2026, 1, 2, 1, 0, 0).unwrap();
        let failed = record(WorkloadPhase::Failed, None);
        assert_eq!(failed.finished_at(seen), Some(seen));
        assert_ne!(failed.finished_at(seen), Some(failed.created_at));
    }

    #[test]
    fn test_record_serializes_phase_by_name() {
        let json = serde_json::to_value(record(WorkloadPhase::Running, None)).unwrap();
        assert_eq!(json["phase"], "Running");
        assert_eq!(json["fingerprint"]["project_id"], "p1");
    }
}
