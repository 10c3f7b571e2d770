//! Per-workflow result processing.
//!
//! Takes the outputs document of one completed workflow, resolves every
//! referenced artifact against the engine's output root, and delivers
//! each one: upload + webhook when storage is configured, inline base64
//! otherwise. Every artifact succeeds or fails on its own — a missing
//! file or a failed upload becomes an error entry in the result list and
//! processing moves on.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

use fluxapp_core::job::DeliveryResult;
use fluxapp_events::WebhookNotifier;
use fluxapp_storage::ArtifactStore;

/// A generated file referenced by a workflow's outputs, relative to the
/// engine's output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub subfolder: String,
    pub filename: String,
}

impl ArtifactRef {
    /// Resolve this reference to a local path.
    pub fn resolve(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.subfolder).join(&self.filename)
    }
}

/// Delivery collaborators shared across a job's artifacts.
pub struct ResultContext<'a> {
    /// Engine output directory artifacts are resolved against.
    pub output_root: &'a Path,
    /// Configured artifact store; `None` switches delivery to inline
    /// base64 payloads.
    pub store: Option<&'a ArtifactStore>,
    /// Configured notifier; fires per uploaded artifact when a
    /// correlation id is present.
    pub notifier: Option<&'a WebhookNotifier>,
}

/// Collect every artifact reference from a workflow's outputs document.
///
/// Scans each node's `images` list for `{subfolder, filename}` pairs.
/// Entries without both fields are skipped.
pub fn extract_artifact_refs(outputs: &Value) -> Vec<ArtifactRef> {
    let Some(nodes) = outputs.as_object() else {
        return Vec::new();
    };

    let mut refs = Vec::new();
    for node_output in nodes.values() {
        let Some(images) = node_output.get("images").and_then(Value::as_array) else {
            continue;
        };
        for image in images {
            let (Some(subfolder), Some(filename)) = (
                image.get("subfolder").and_then(Value::as_str),
                image.get("filename").and_then(Value::as_str),
            ) else {
                continue;
            };
            refs.push(ArtifactRef {
                subfolder: subfolder.to_owned(),
                filename: filename.to_owned(),
            });
        }
    }
    refs
}

/// Deliver every artifact of one completed workflow.
///
/// Returns one [`DeliveryResult`] per referenced artifact, in reference
/// order.
pub async fn process_outputs(
    ctx: &ResultContext<'_>,
    outputs: &Value,
    job_id: &str,
    inference_job_id: Option<&str>,
) -> Vec<DeliveryResult> {
    let refs = extract_artifact_refs(outputs);
    tracing::info!(job_id = %job_id, artifacts = refs.len(), "Processing output images");

    let mut results = Vec::with_capacity(refs.len());
    for artifact in &refs {
        results.push(deliver_one(ctx, artifact, job_id, inference_job_id).await);
    }
    results
}

/// Deliver a single artifact: missing-file check, then upload or inline.
async fn deliver_one(
    ctx: &ResultContext<'_>,
    artifact: &ArtifactRef,
    job_id: &str,
    inference_job_id: Option<&str>,
) -> DeliveryResult {
    let local_path = artifact.resolve(ctx.output_root);
    tracing::info!(job_id = %job_id, path = %local_path.display(), "Processing image");

    if !local_path.exists() {
        tracing::error!(
            job_id = %job_id,
            path = %local_path.display(),
            "The image does not exist in the output folder",
        );
        return DeliveryResult::error(format!(
            "the image does not exist in the specified output folder: {}",
            local_path.display()
        ));
    }

    match ctx.store {
        Some(store) => upload_and_notify(ctx, store, &local_path, job_id, inference_job_id).await,
        None => inline_artifact(&local_path).await,
    }
}

/// Upload the artifact, then fire the webhook for its URL. The webhook
/// outcome never changes the delivery result.
async fn upload_and_notify(
    ctx: &ResultContext<'_>,
    store: &ArtifactStore,
    local_path: &Path,
    job_id: &str,
    inference_job_id: Option<&str>,
) -> DeliveryResult {
    let image_url = match store.upload_artifact(job_id, local_path).await {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(
                job_id = %job_id,
                path = %local_path.display(),
                error = %e,
                "Failed to upload image to S3",
            );
            return DeliveryResult::error(format!("Failed to upload image to S3: {e}"));
        }
    };

    tracing::info!(job_id = %job_id, image_url = %image_url, "Image uploaded to S3");

    if let Some(notifier) = ctx.notifier {
        if !notifier
            .notify_image_ready(&image_url, job_id, inference_job_id)
            .await
        {
            tracing::warn!(job_id = %job_id, image_url = %image_url, "Failed to send image URL to webhook");
        }
    }

    DeliveryResult::success(image_url)
}

/// Base64-encode the artifact content as the delivery payload.
async fn inline_artifact(local_path: &Path) -> DeliveryResult {
    match tokio::fs::read(local_path).await {
        Ok(bytes) => DeliveryResult::success(BASE64.encode(bytes)),
        Err(e) => DeliveryResult::error(format!(
            "Failed to read image {}: {e}",
            local_path.display()
        )),
    }
}
