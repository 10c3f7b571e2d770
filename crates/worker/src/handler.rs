//! The job pipeline.
//!
//! [`JobRunner`] owns the per-invocation collaborators (engine client,
//! optional artifact store, optional webhook notifier) and drives a job
//! through validate → probe → stage → submit → poll/deliver. Job-level
//! failures short-circuit into a top-level error response; artifact-level
//! failures stay inside the result list.

use std::time::Duration;

use fluxapp_comfyui::probe::{wait_until_ready, ProbeConfig};
use fluxapp_comfyui::staging::stage_images;
use fluxapp_comfyui::ComfyApi;
use fluxapp_core::config::WorkerConfig;
use fluxapp_core::error::JobError;
use fluxapp_core::job::{validate_input, JobResponse, JobResult, RunpodJob};
use fluxapp_events::WebhookNotifier;
use fluxapp_storage::ArtifactStore;

use crate::poll::{CompletionPoller, PollConfig, SubmissionHandle};
use crate::results::{process_outputs, ResultContext};

/// Runs jobs against one configured engine.
pub struct JobRunner {
    config: WorkerConfig,
    api: ComfyApi,
    store: Option<ArtifactStore>,
    notifier: Option<WebhookNotifier>,
}

impl JobRunner {
    /// Build a runner and its collaborators from the worker
    /// configuration. Storage and webhook delivery are enabled only when
    /// their config groups are present.
    pub fn new(config: WorkerConfig) -> Self {
        let api = ComfyApi::new(config.engine.base_url());
        let store = config.storage.as_ref().map(ArtifactStore::new);
        let notifier = config.webhook.as_ref().map(WebhookNotifier::new);
        Self {
            config,
            api,
            store,
            notifier,
        }
    }

    /// Run one job to a response.
    ///
    /// Never panics and never returns a transport error: every failure
    /// mode collapses into the response contract (`{"error": ...}` or a
    /// result list with per-artifact statuses).
    pub async fn run(&self, job: &RunpodJob) -> JobResponse {
        tracing::info!(job_id = %job.id, "Handling job");

        match self.execute(job).await {
            Ok(result) => {
                tracing::info!(
                    job_id = %job.id,
                    artifacts = result.result.len(),
                    "Image generation completed successfully",
                );
                JobResponse::Completed(result)
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Job failed");
                JobResponse::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// The fallible pipeline behind [`run`](Self::run).
    async fn execute(&self, job: &RunpodJob) -> Result<JobResult, JobError> {
        let input = validate_input(Some(&job.input))?;

        let probe = ProbeConfig {
            interval: Duration::from_millis(self.config.engine.probe_interval_ms),
            max_attempts: self.config.engine.probe_max_attempts,
        };
        if !wait_until_ready(&self.api, &probe).await {
            return Err(JobError::EngineUnavailable {
                attempts: probe.max_attempts,
            });
        }

        let staging = stage_images(&self.api, &input.images).await;
        if !staging.succeeded() {
            return Err(JobError::AssetStaging {
                failures: staging.failures,
            });
        }

        let handles = self.submit_all(job, &input.workflows).await?;

        let poll_config = PollConfig {
            interval: Duration::from_millis(self.config.engine.polling_interval_ms),
            max_attempts: self.config.engine.polling_max_attempts,
        };
        let mut poller = CompletionPoller::new(&self.api, poll_config, handles);

        let ctx = ResultContext {
            output_root: &self.config.engine.output_root,
            store: self.store.as_ref(),
            notifier: self.notifier.as_ref(),
        };

        // Deliver each workflow's artifacts the moment it completes;
        // artifacts already delivered stay delivered even if a later
        // workflow times the job out.
        let mut results = Vec::new();
        while let Some((handle, outputs)) = poller.next_completed().await? {
            tracing::info!(
                job_id = %job.id,
                prompt_id = %handle.prompt_id,
                "Workflow completed, processing results",
            );
            results.extend(
                process_outputs(&ctx, &outputs, &job.id, input.inference_job_id.as_deref())
                    .await,
            );
        }

        Ok(JobResult {
            result: results,
            refresh_worker: self.config.refresh_worker,
        })
    }

    /// Submit every workflow in document order, one handle each.
    ///
    /// A submission failure aborts the job; earlier submissions are not
    /// cancelled (the engine still runs them, but their results are
    /// never collected).
    async fn submit_all(
        &self,
        job: &RunpodJob,
        workflows: &[serde_json::Value],
    ) -> Result<Vec<SubmissionHandle>, JobError> {
        let mut handles = Vec::with_capacity(workflows.len());

        for (index, workflow) in workflows.iter().enumerate() {
            let response = self.api.submit_workflow(workflow).await.map_err(|e| {
                JobError::Submission {
                    index,
                    reason: e.to_string(),
                }
            })?;

            tracing::info!(
                job_id = %job.id,
                workflow_index = index,
                prompt_id = %response.prompt_id,
                "Queued workflow",
            );

            handles.push(SubmissionHandle {
                workflow_index: index,
                prompt_id: response.prompt_id,
            });
        }

        Ok(handles)
    }
}
