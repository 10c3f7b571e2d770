//! Error taxonomy for the job pipeline.
//!
//! Job-level errors ([`JobError`]) short-circuit the pipeline and become a
//! top-level `{"error": ...}` response. Artifact-level failures (a missing
//! output file, a failed upload) are *not* errors in this taxonomy — they
//! are recorded inline as error-status
//! [`DeliveryResult`](crate::job::DeliveryResult) entries so that one bad
//! artifact never aborts the rest of the batch.

/// A job payload that failed shape validation.
///
/// Message strings are part of the worker's response contract and must not
/// be reworded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No payload was provided at all.
    #[error("Please provide input")]
    MissingInput,

    /// The payload was a string that does not parse as JSON.
    #[error("Invalid JSON format in input")]
    InvalidPayloadFormat,

    /// The `workflow` field is absent or null.
    #[error("Missing 'workflow' parameter")]
    MissingWorkflow,

    /// The `workflow` field is present but contains no workflows.
    #[error("No workflows provided")]
    NoWorkflows,

    /// The `images` field is present but malformed.
    #[error("'images' must be a list of objects with 'name' and 'image' keys")]
    InvalidImagesShape,
}

/// A failure that aborts the whole job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The job payload failed validation. Nothing was submitted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The engine never responded healthy within the probe budget.
    /// Nothing was submitted.
    #[error("ComfyUI API is unreachable after {attempts} attempts")]
    EngineUnavailable {
        /// Number of probe attempts performed.
        attempts: u32,
    },

    /// One or more input images failed to upload to the engine. Images
    /// that uploaded before the failure are left in place (uploads are
    /// idempotent overwrites keyed by name).
    #[error("Some images failed to upload: {}", .failures.join("; "))]
    AssetStaging {
        /// Per-image failure descriptions.
        failures: Vec<String>,
    },

    /// The engine rejected a workflow or was unreachable during
    /// submission. Earlier submissions in the same job are not cancelled;
    /// the engine will still run them, but their results are never
    /// collected.
    #[error("Error queuing workflow {index}: {reason}")]
    Submission {
        /// Zero-based position of the failed workflow in the job.
        index: usize,
        /// Underlying HTTP or response-shape failure.
        reason: String,
    },

    /// The polling budget ran out with workflows still pending. Artifacts
    /// already delivered for completed workflows remain delivered.
    #[error(
        "Max retries reached while waiting for image generation \
         ({completed}/{total} workflows completed)"
    )]
    PollTimeout {
        /// Workflows that completed and were processed before the budget
        /// ran out.
        completed: usize,
        /// Total workflows in the job.
        total: usize,
    },
}

/// A configuration group that was only partially supplied.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Some but not all variables of an optional group are set.
    #[error("{group} configuration is incomplete, missing key(s): {}", .missing.join(", "))]
    Incomplete {
        /// Human-readable group name (e.g. `"S3"`).
        group: &'static str,
        /// The unset variable names.
        missing: Vec<&'static str>,
    },
}
