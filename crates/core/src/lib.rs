//! Shared types for the inference worker: job payloads, configuration,
//! the error taxonomy, and webhook signing utilities.
//!
//! This crate has no internal dependencies so it can be used by every
//! other crate in the workspace.

pub mod config;
pub mod error;
pub mod job;
pub mod signing;
