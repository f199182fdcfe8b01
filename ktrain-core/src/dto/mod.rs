//! Data Transfer Objects for the dispatcher HTTP API

pub mod training;
pub mod workload;
