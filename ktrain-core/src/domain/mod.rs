//! Core domain types
//!
//! Shared between the dispatcher (which derives them from cluster state)
//! and the HTTP client (which receives them over the wire).

pub mod credential;
pub mod fingerprint;
pub mod training;
pub mod workload;

pub use credential::CredentialRef;
pub use fingerprint::Fingerprint;
pub use training::{ResourceProfile, TrainingRequest};
pub use workload::{Disposition, WorkloadPhase, WorkloadRecord};
