//! ktrain Core
//!
//! Core types and abstractions for the ktrain training dispatcher.
//!
//! This crate contains:
//! - Domain types: fingerprints, training requests, workload records
//! - DTOs: request/response bodies of the dispatcher HTTP API
//! - Validation shared by the dispatcher and its clients

pub mod domain;
pub mod dto;
pub mod validation;
