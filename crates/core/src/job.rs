//! Job payload model and input validation.
//!
//! A job arrives as a platform envelope (`{"id": ..., "input": {...}}`).
//! The `input` document is normalized by [`validate_input`] into a
//! [`JobInput`] before anything touches the network. Workflow documents
//! are carried as opaque [`serde_json::Value`]s — the worker never
//! inspects their internals, it only requires they exist.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// The platform envelope the worker is invoked with.
#[derive(Debug, Clone, Deserialize)]
pub struct RunpodJob {
    /// Unique job identifier assigned by the platform.
    pub id: String,
    /// The raw job input document (validated by [`validate_input`]).
    pub input: Value,
}

/// One input image to stage on the engine before submission.
///
/// `image` is the base64-encoded file content; it is decoded only at
/// upload time, never during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputImage {
    /// Filename the engine will store the image under.
    pub name: String,
    /// Base64-encoded image bytes.
    pub image: String,
}

/// A validated, normalized job input.
///
/// Serializing a `JobInput` reproduces the wire shape, so a normalized
/// input re-validates to itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobInput {
    /// Workflow documents, in submission order. Never empty.
    #[serde(rename = "workflow")]
    pub workflows: Vec<Value>,
    /// Input images to stage before submission. May be empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<InputImage>,
    /// Correlation id for webhook notifications, if the caller wants them.
    #[serde(rename = "inferenceJobId", skip_serializing_if = "Option::is_none")]
    pub inference_job_id: Option<String>,
}

/// Outcome of delivering one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Error,
}

/// One entry in the job's `result` list: a storage URL or inline-encoded
/// artifact on success, a human-readable message on error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub status: DeliveryStatus,
    pub message: String,
}

impl DeliveryResult {
    /// A successful delivery carrying a storage URL or inline content.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Success,
            message: message.into(),
        }
    }

    /// A failed delivery carrying a human-readable description.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Error,
            message: message.into(),
        }
    }
}

/// The successful job response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Per-artifact delivery results, in the order artifacts were
    /// processed.
    pub result: Vec<DeliveryResult>,
    /// Whether the platform should recycle this worker after the job.
    pub refresh_worker: bool,
}

/// The full job response: either a result list or a top-level error.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JobResponse {
    Completed(JobResult),
    Failed { error: String },
}

/// Validate and normalize a raw job input document.
///
/// Accepts either a JSON object or a JSON-encoded string of one. Checks,
/// in order: the payload exists, parses, carries a non-null `workflow`,
/// and — when `images` is present — that every entry has `name` and
/// `image` string fields. Pure: no I/O, no side effects.
///
/// A `workflow` array supplies the job's workflows in order; a single
/// object is accepted as a one-workflow job.
pub fn validate_input(raw: Option<&Value>) -> Result<JobInput, ValidationError> {
    let raw = match raw {
        None | Some(Value::Null) => return Err(ValidationError::MissingInput),
        Some(value) => value,
    };

    // A string payload must itself parse as JSON.
    let parsed;
    let input = match raw {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text)
                .map_err(|_| ValidationError::InvalidPayloadFormat)?;
            &parsed
        }
        other => other,
    };

    let workflows = match input.get("workflow") {
        None | Some(Value::Null) => return Err(ValidationError::MissingWorkflow),
        Some(Value::Array(entries)) if entries.is_empty() => {
            return Err(ValidationError::NoWorkflows)
        }
        Some(Value::Array(entries)) => entries.clone(),
        Some(single) => vec![single.clone()],
    };

    let images = match input.get("images") {
        None | Some(Value::Null) => Vec::new(),
        Some(entries) => parse_images(entries)?,
    };

    let inference_job_id = input
        .get("inferenceJobId")
        .and_then(Value::as_str)
        .map(str::to_owned);

    Ok(JobInput {
        workflows,
        images,
        inference_job_id,
    })
}

/// Parse the `images` field: a list where every entry carries `name` and
/// `image` string keys.
fn parse_images(entries: &Value) -> Result<Vec<InputImage>, ValidationError> {
    let list = entries
        .as_array()
        .ok_or(ValidationError::InvalidImagesShape)?;

    list.iter()
        .map(|entry| {
            serde_json::from_value::<InputImage>(entry.clone())
                .map_err(|_| ValidationError::InvalidImagesShape)
        })
        .collect()
}
