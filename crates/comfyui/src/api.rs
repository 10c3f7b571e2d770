//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the engine surface the worker consumes: readiness (`GET /`),
//! input-image upload (`POST /upload/image`), workflow submission
//! (`POST /prompt`), and history retrieval (`GET /history/{id}`), using
//! [`reqwest`].

use std::time::Duration;

use serde::Deserialize;

/// Timeout applied to every engine request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a single ComfyUI engine.
pub struct ComfyApi {
    client: reqwest::Client,
    base_url: String,
}

/// Response returned by the engine's `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
}

/// Errors from the engine REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyApiError {
    /// The HTTP request itself failed (network, DNS, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ComfyApi {
    /// Create a new API client for an engine.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://127.0.0.1:8188`.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, base_url }
    }

    /// Base HTTP URL this client targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One readiness check: `GET` against the base URL.
    ///
    /// Returns `true` only for HTTP 200. Transport errors and every other
    /// status read as "not ready yet" — retrying is the caller's concern
    /// (see [`probe`](crate::probe)).
    pub async fn is_ready(&self) -> bool {
        match self.client.get(&self.base_url).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }

    /// Upload one input image to the engine.
    ///
    /// Sends a `POST /upload/image` multipart request with the decoded
    /// file bytes and `overwrite=true`, so re-staging the same name is an
    /// idempotent re-write.
    pub async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<(), ComfyApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_owned())
            .mime_str("image/png")
            .expect("static mime string is valid");

        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("overwrite", "true");

        let response = self
            .client
            .post(format!("{}/upload/image", self.base_url))
            .multipart(form)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with the workflow wrapped as
    /// `{"prompt": <workflow>}` (the top-level `prompt` element is
    /// required by the engine). Returns the server-assigned `prompt_id`.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<SubmitResponse, ComfyApiError> {
        let body = serde_json::json!({ "prompt": workflow });

        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends `GET /history/{prompt_id}`. A completed prompt's entry
    /// carries an `outputs` section with the generated file references.
    pub async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.base_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ComfyApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
