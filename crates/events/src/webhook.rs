//! Signed result-image webhook delivery.
//!
//! [`WebhookNotifier`] POSTs a canonical JSON payload to the configured
//! endpoint with an HMAC-SHA256 signature of the exact body bytes in the
//! `X-Webhook-Signature` header. Delivery is single-shot and best-effort:
//! the boolean return is the only outcome signal, and it never affects
//! the delivery status of the artifact itself.

use std::time::Duration;

use fluxapp_core::config::WebhookConfig;
use fluxapp_core::signing::sign_payload;

/// HTTP request timeout for a delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers result-image notifications to an external endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    secret: String,
}

impl WebhookNotifier {
    /// Create a notifier with a pre-configured HTTP client.
    pub fn new(config: &WebhookConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            url: config.url.clone(),
            secret: config.secret.clone(),
        }
    }

    /// Notify the endpoint that an artifact URL is ready.
    ///
    /// Skips delivery (with a warning) when the job carries no
    /// correlation id — the receiver has nothing to correlate the image
    /// against. Returns `true` only for a 2xx response; transport errors,
    /// timeouts, and non-2xx statuses all read as `false`.
    pub async fn notify_image_ready(
        &self,
        image_url: &str,
        job_id: &str,
        inference_job_id: Option<&str>,
    ) -> bool {
        let Some(inference_job_id) = inference_job_id else {
            tracing::warn!(job_id = %job_id, "No inference job id provided, skipping webhook");
            return false;
        };

        let payload = serde_json::json!({
            "job_id": job_id,
            "image_url": image_url,
            "image_name": image_name_from_url(image_url),
            "inferenceJobId": inference_job_id,
        });
        let body = payload.to_string();
        let signature = sign_payload(&self.secret, &body);

        let result = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Signature", signature)
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!(job_id = %job_id, image_url = %image_url, "Image URL sent to webhook");
                true
            }
            Ok(response) => {
                tracing::warn!(
                    job_id = %job_id,
                    status = response.status().as_u16(),
                    "Webhook rejected notification",
                );
                false
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Error sending image URL to webhook");
                false
            }
        }
    }
}

/// Extract the artifact filename from a (possibly presigned) URL:
/// the final path segment, stripped of any query component.
fn image_name_from_url(url: &str) -> &str {
    let without_query = url.split('?').next().unwrap_or(url);
    without_query.rsplit('/').next().unwrap_or(without_query)
}
