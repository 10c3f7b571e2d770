//! S3 artifact store.
//!
//! Uploads generated artifacts under a `{job_id}/{random-name}{ext}` key
//! and hands back a time-limited presigned GET URL as the delivery
//! payload. The store is constructed once per invocation from the
//! configured bucket credentials.

use std::path::Path;
use std::time::Duration;

use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use fluxapp_core::config::StorageConfig;

/// How long presigned retrieval URLs stay valid (7 days, the SigV4
/// maximum).
const PRESIGNED_URL_EXPIRY: Duration = Duration::from_secs(604_800);

/// Length of the random object-name component.
const OBJECT_NAME_LENGTH: usize = 8;

/// Errors from the artifact store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading the artifact from the local filesystem failed.
    #[error("Failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    /// The put-object call failed.
    #[error("Failed to upload artifact: {0}")]
    Upload(String),

    /// Presigned URL generation failed.
    #[error("Failed to presign artifact URL: {0}")]
    Presign(String),
}

/// S3 client bound to one bucket.
pub struct ArtifactStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl ArtifactStore {
    /// Build a store from the configured endpoint and credentials.
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "worker-env",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint_url)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    /// Upload one artifact and return a presigned retrieval URL.
    ///
    /// The object key is `{job_id}/{random8}{ext}`; the original filename
    /// is not reused, so repeated generations never collide.
    pub async fn upload_artifact(
        &self,
        job_id: &str,
        local_path: &Path,
    ) -> Result<String, StorageError> {
        let random_name = uuid::Uuid::new_v4().to_string();
        let (key, content_type) =
            object_key(job_id, &random_name[..OBJECT_NAME_LENGTH], local_path);

        let bytes = tokio::fs::read(local_path).await?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size = bytes.len(),
            "Uploading artifact to bucket",
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(&content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        let presigning = PresigningConfig::expires_in(PRESIGNED_URL_EXPIRY)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}

/// Build the object key and content type for an artifact.
///
/// The extension is carried over from the local file when present;
/// extensionless files fall back to a generic content type.
fn object_key(job_id: &str, object_name: &str, local_path: &Path) -> (String, String) {
    match local_path.extension().and_then(|e| e.to_str()) {
        Some(ext) => (
            format!("{job_id}/{object_name}.{ext}"),
            format!("image/{ext}"),
        ),
        None => (
            format!("{job_id}/{object_name}"),
            "application/octet-stream".to_string(),
        ),
    }
}
