//! Input-asset staging.
//!
//! Pushes the job's input images to the engine before any workflow is
//! submitted. Each image is decoded and uploaded independently; failures
//! are collected rather than short-circuiting, so one bad image does not
//! prevent the others from uploading. The caller aborts the job if any
//! failures were collected — already-uploaded images are left in place,
//! since uploads are overwrite-by-name and a redelivery simply rewrites
//! them.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use fluxapp_core::job::InputImage;

use crate::api::ComfyApi;

/// Aggregate outcome of staging a job's input images.
#[derive(Debug, Default)]
pub struct StagingSummary {
    /// Per-image success lines.
    pub details: Vec<String>,
    /// Per-image failure lines. Empty means staging succeeded.
    pub failures: Vec<String>,
}

impl StagingSummary {
    /// True when every image uploaded.
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Upload every input image to the engine.
///
/// An empty slice trivially succeeds without any network traffic.
pub async fn stage_images(api: &ComfyApi, images: &[InputImage]) -> StagingSummary {
    let mut summary = StagingSummary::default();

    if images.is_empty() {
        tracing::info!("No images to upload");
        return summary;
    }

    tracing::info!(count = images.len(), "Starting image(s) upload");

    for image in images {
        match stage_one(api, image).await {
            Ok(()) => {
                tracing::info!(image_name = %image.name, "Successfully uploaded image");
                summary
                    .details
                    .push(format!("Successfully uploaded {}", image.name));
            }
            Err(reason) => {
                tracing::error!(image_name = %image.name, error = %reason, "Error uploading image");
                summary
                    .failures
                    .push(format!("Error uploading {}: {reason}", image.name));
            }
        }
    }

    if summary.succeeded() {
        tracing::info!("Image(s) upload complete");
    } else {
        tracing::error!(failures = summary.failures.len(), "Image(s) upload completed with errors");
    }

    summary
}

/// Decode and upload a single image.
async fn stage_one(api: &ComfyApi, image: &InputImage) -> Result<(), String> {
    let bytes = BASE64
        .decode(&image.image)
        .map_err(|e| format!("invalid base64 image content: {e}"))?;

    api.upload_image(&image.name, bytes)
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn image(name: &str, content: &str) -> InputImage {
        InputImage {
            name: name.into(),
            image: content.into(),
        }
    }

    #[tokio::test]
    async fn empty_input_uploads_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/image"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let api = ComfyApi::new(server.uri());
        let summary = stage_images(&api, &[]).await;
        assert!(summary.succeeded());
        assert!(summary.details.is_empty());
    }

    #[tokio::test]
    async fn all_images_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/image"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let api = ComfyApi::new(server.uri());
        let summary =
            stage_images(&api, &[image("a.png", "aGk="), image("b.png", "aGk=")]).await;
        assert!(summary.succeeded());
        assert_eq!(
            summary.details,
            vec!["Successfully uploaded a.png", "Successfully uploaded b.png"]
        );
    }

    #[tokio::test]
    async fn one_bad_image_does_not_stop_the_others() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/image"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let api = ComfyApi::new(server.uri());
        let summary = stage_images(
            &api,
            &[
                image("a.png", "aGk="),
                image("bad.png", "%%% not base64 %%%"),
                image("c.png", "aGk="),
            ],
        )
        .await;

        assert!(!summary.succeeded());
        assert_eq!(summary.details.len(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].starts_with("Error uploading bad.png:"));
    }

    #[tokio::test]
    async fn engine_rejection_is_collected_per_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/image"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .expect(1)
            .mount(&server)
            .await;

        let api = ComfyApi::new(server.uri());
        let summary = stage_images(&api, &[image("a.png", "aGk=")]).await;
        assert!(!summary.succeeded());
        assert!(summary.failures[0].contains("disk full"));
    }
}
