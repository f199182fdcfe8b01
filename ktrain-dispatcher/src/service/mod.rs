//! Service Module
//!
//! Business logic of the dispatcher: request dispatch and the background
//! lifecycle reconciler. Both reach the cluster only through
//! [`SubmissionClient`](crate::cluster::SubmissionClient).

pub mod dispatcher;
pub mod reconciler;

pub use dispatcher::{
    Dispatch, DispatchOptions, Dispatcher, ModelArtifact, ReusePolicy, WaitOutcome,
};
pub use reconciler::{ReconcileReport, ReconcileSettings, Reconciler};
