//! Completion polling across all submitted workflows.
//!
//! Each submitted workflow is tracked by a [`SubmissionHandle`]. A handle
//! is Pending until one history query shows an `outputs` section for its
//! prompt, at which point it moves to Completed exactly once and is never
//! queried again. [`CompletionPoller::next_completed`] hands completed
//! handles to the caller one at a time so results can be processed the
//! moment they exist, while other workflows are still generating.

use std::collections::VecDeque;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;

use fluxapp_comfyui::ComfyApi;
use fluxapp_core::error::JobError;

/// The worker's local reference to one in-flight engine submission.
///
/// Created once per workflow after a successful `/prompt` call;
/// immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle {
    /// Position of the workflow in the job's `workflow` list.
    pub workflow_index: usize,
    /// The engine-assigned prompt id.
    pub prompt_id: String,
}

/// Tunable parameters for the poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between poll passes when nothing new completed.
    pub interval: Duration,
    /// Maximum number of poll passes.
    pub max_attempts: u32,
}

/// Drives every handle from Pending to Completed.
pub struct CompletionPoller<'a> {
    api: &'a ComfyApi,
    config: PollConfig,
    /// Handles not yet seen complete. Shrinks monotonically.
    pending: Vec<SubmissionHandle>,
    /// Completed handles with their output documents, awaiting pickup.
    ready: VecDeque<(SubmissionHandle, Value)>,
    iterations: u32,
    completed: usize,
    total: usize,
}

impl<'a> CompletionPoller<'a> {
    pub fn new(api: &'a ComfyApi, config: PollConfig, handles: Vec<SubmissionHandle>) -> Self {
        let total = handles.len();
        Self {
            api,
            config,
            pending: handles,
            ready: VecDeque::new(),
            iterations: 0,
            completed: 0,
            total,
        }
    }

    /// Yield the next newly completed handle with its outputs document.
    ///
    /// Polls (concurrently, one history query per still-pending handle)
    /// until something completes, every handle is done, or the pass
    /// budget runs out. Returns `Ok(None)` once all handles have been
    /// yielded, and [`JobError::PollTimeout`] when the budget is
    /// exhausted with handles still pending — anything already yielded
    /// stays delivered.
    pub async fn next_completed(
        &mut self,
    ) -> Result<Option<(SubmissionHandle, Value)>, JobError> {
        loop {
            if let Some(entry) = self.ready.pop_front() {
                self.completed += 1;
                return Ok(Some(entry));
            }
            if self.pending.is_empty() {
                return Ok(None);
            }
            if self.iterations >= self.config.max_attempts {
                tracing::error!(
                    completed = self.completed,
                    total = self.total,
                    "Max retries reached while waiting for image generation",
                );
                return Err(JobError::PollTimeout {
                    completed: self.completed,
                    total: self.total,
                });
            }

            self.poll_pass().await;
            self.iterations += 1;

            // Only sleep when the pass moved nothing forward; completed
            // work is handed out immediately.
            if self.ready.is_empty() && !self.pending.is_empty() {
                tokio::time::sleep(self.config.interval).await;
            }
        }
    }

    /// One poll pass: query every pending handle concurrently and move
    /// the completed ones to the ready queue, preserving handle order.
    async fn poll_pass(&mut self) {
        let api = self.api;
        let queries = self.pending.iter().map(|handle| async move {
            let result = api.get_history(&handle.prompt_id).await;
            (handle.clone(), result)
        });

        let responses = join_all(queries).await;

        let mut still_pending = Vec::with_capacity(self.pending.len());
        for (handle, result) in responses {
            match result {
                Ok(history) => match completed_outputs(&history, &handle.prompt_id) {
                    Some(outputs) => {
                        tracing::info!(
                            prompt_id = %handle.prompt_id,
                            workflow_index = handle.workflow_index,
                            "Workflow completed",
                        );
                        self.ready.push_back((handle, outputs));
                    }
                    None => still_pending.push(handle),
                },
                Err(e) => {
                    // Transient query failures read as "not done yet";
                    // the pass budget still bounds the total wait.
                    tracing::warn!(
                        prompt_id = %handle.prompt_id,
                        error = %e,
                        "History query failed, will retry",
                    );
                    still_pending.push(handle);
                }
            }
        }
        self.pending = still_pending;
    }
}

/// Extract the outputs document for a prompt if generation finished.
///
/// The engine reports completion by including a non-empty `outputs`
/// object under the prompt's history entry.
fn completed_outputs(history: &Value, prompt_id: &str) -> Option<Value> {
    let outputs = history.get(prompt_id)?.get("outputs")?;
    match outputs {
        Value::Object(map) if !map.is_empty() => Some(outputs.clone()),
        _ => None,
    }
}
