//! Bounded availability probing.
//!
//! Before a job submits anything, the worker blocks until the engine
//! answers its readiness check or the attempt budget runs out. Individual
//! failed attempts are silent; only the final boolean communicates the
//! outcome.

use std::time::Duration;

use crate::api::ComfyApi;

/// Tunable parameters for the availability probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Delay between attempts.
    pub interval: Duration,
    /// Maximum number of attempts.
    pub max_attempts: u32,
}

/// Probe the engine until it responds healthy or the budget is exhausted.
///
/// Performs at most `max_attempts` readiness checks, sleeping `interval`
/// between them. Returns `true` as soon as one check sees HTTP 200, and
/// `false` once the budget runs out without a success.
pub async fn wait_until_ready(api: &ComfyApi, config: &ProbeConfig) -> bool {
    for attempt in 1..=config.max_attempts {
        if api.is_ready().await {
            tracing::info!(url = %api.base_url(), attempt, "ComfyUI API is reachable");
            return true;
        }

        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval).await;
        }
    }

    tracing::error!(
        url = %api.base_url(),
        attempts = config.max_attempts,
        "Failed to connect to ComfyUI API",
    );
    false
}
