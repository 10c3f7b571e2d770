//! Worker configuration loaded from environment variables.
//!
//! All timing values are plain data (`u64` milliseconds / attempt counts)
//! so the retry loops that consume them can run with zero-length delays
//! in tests.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Connection and retry settings for the ComfyUI engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine `host:port` (default: `127.0.0.1:8188`).
    pub host: String,
    /// Delay between availability probe attempts, in milliseconds.
    pub probe_interval_ms: u64,
    /// Maximum availability probe attempts.
    pub probe_max_attempts: u32,
    /// Delay between completion poll passes, in milliseconds.
    pub polling_interval_ms: u64,
    /// Maximum completion poll iterations.
    pub polling_max_attempts: u32,
    /// Directory on the engine host where generated files land.
    pub output_root: PathBuf,
}

impl EngineConfig {
    /// The engine's base HTTP URL, e.g. `http://127.0.0.1:8188`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.host)
    }
}

/// S3-compatible object storage settings. Present only when the full
/// variable group is configured.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
}

/// Result-image webhook settings. Present only when both the endpoint and
/// the signing secret are configured.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub secret: String,
}

/// Full worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub engine: EngineConfig,
    /// When absent, artifacts are returned inline (base64) instead of
    /// being uploaded.
    pub storage: Option<StorageConfig>,
    /// When absent, no notifications are sent.
    pub webhook: Option<WebhookConfig>,
    /// Echoed in every success response; tells the platform to recycle
    /// the worker after this job.
    pub refresh_worker: bool,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env var | Default |
    /// |---|---|
    /// | `COMFY_HOST` | `127.0.0.1:8188` |
    /// | `COMFY_API_AVAILABLE_INTERVAL_MS` | `50` |
    /// | `COMFY_API_AVAILABLE_MAX_RETRIES` | `500` |
    /// | `COMFY_POLLING_INTERVAL_MS` | `250` |
    /// | `COMFY_POLLING_MAX_RETRIES` | `500` |
    /// | `COMFY_OUTPUT_PATH` | `/comfyui/output` |
    /// | `REFRESH_WORKER` | `false` |
    ///
    /// The S3 group (`BUCKET_ENDPOINT_URL`, `BUCKET_ACCESS_KEY_ID`,
    /// `BUCKET_SECRET_ACCESS_KEY`, `S3_REGION`, `S3_BUCKET_NAME`) and the
    /// webhook pair (`RESULT_IMAGE_WEBHOOK_URL`,
    /// `RESULT_IMAGE_WEBHOOK_SECRET`) are optional, but partially setting
    /// a group is an error naming the missing keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        let engine = EngineConfig {
            host: env_or("COMFY_HOST", "127.0.0.1:8188"),
            probe_interval_ms: env_parse("COMFY_API_AVAILABLE_INTERVAL_MS", 50),
            probe_max_attempts: env_parse("COMFY_API_AVAILABLE_MAX_RETRIES", 500),
            polling_interval_ms: env_parse("COMFY_POLLING_INTERVAL_MS", 250),
            polling_max_attempts: env_parse("COMFY_POLLING_MAX_RETRIES", 500),
            output_root: PathBuf::from(env_or("COMFY_OUTPUT_PATH", "/comfyui/output")),
        };

        let storage = optional_group(
            "S3",
            &[
                ("BUCKET_ENDPOINT_URL", env_opt("BUCKET_ENDPOINT_URL")),
                ("BUCKET_ACCESS_KEY_ID", env_opt("BUCKET_ACCESS_KEY_ID")),
                (
                    "BUCKET_SECRET_ACCESS_KEY",
                    env_opt("BUCKET_SECRET_ACCESS_KEY"),
                ),
                ("S3_REGION", env_opt("S3_REGION")),
                ("S3_BUCKET_NAME", env_opt("S3_BUCKET_NAME")),
            ],
        )?
        .map(|mut values| StorageConfig {
            bucket: values.pop().expect("group has five values"),
            region: values.pop().expect("group has five values"),
            secret_access_key: values.pop().expect("group has five values"),
            access_key_id: values.pop().expect("group has five values"),
            endpoint_url: values.pop().expect("group has five values"),
        });

        let webhook = optional_group(
            "Webhook",
            &[
                (
                    "RESULT_IMAGE_WEBHOOK_URL",
                    env_opt("RESULT_IMAGE_WEBHOOK_URL"),
                ),
                (
                    "RESULT_IMAGE_WEBHOOK_SECRET",
                    env_opt("RESULT_IMAGE_WEBHOOK_SECRET"),
                ),
            ],
        )?
        .map(|mut values| WebhookConfig {
            secret: values.pop().expect("group has two values"),
            url: values.pop().expect("group has two values"),
        });

        let refresh_worker = env_or("REFRESH_WORKER", "false").to_lowercase() == "true";

        Ok(Self {
            engine,
            storage,
            webhook,
            refresh_worker,
        })
    }
}

/// Read an env var with a default for the unset/empty case.
fn env_or(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

/// Read an env var, treating unset and empty as absent.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Read and parse a numeric env var, falling back to `default` when unset.
fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid number")),
        _ => default,
    }
}

/// Resolve an all-or-nothing variable group.
///
/// Returns `None` when every variable is unset, the values in declaration
/// order when every variable is set, and [`ConfigError::Incomplete`]
/// otherwise.
fn optional_group(
    group: &'static str,
    vars: &[(&'static str, Option<String>)],
) -> Result<Option<Vec<String>>, ConfigError> {
    let missing: Vec<&'static str> = vars
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect();

    if missing.len() == vars.len() {
        return Ok(None);
    }
    if !missing.is_empty() {
        return Err(ConfigError::Incomplete { group, missing });
    }
    Ok(Some(
        vars.iter()
            .map(|(_, value)| value.clone().expect("checked above"))
            .collect(),
    ))
}
