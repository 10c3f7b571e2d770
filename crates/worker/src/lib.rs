//! The job handler: validation, orchestration, completion polling, and
//! result processing.
//!
//! [`handler::JobRunner`] drives one job end to end: validate the
//! payload, wait for the engine, stage input images, submit every
//! workflow, then poll until all submissions complete — delivering each
//! workflow's artifacts the moment it finishes.

pub mod handler;
pub mod poll;
pub mod results;

pub use handler::JobRunner;
