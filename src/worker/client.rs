//! Generic worker client: publish a task, block on the correlated reply.
//!
//! `invoke` is a synchronous RPC built on pub/sub. The callback channel is
//! shared by every job using the same worker, so replies are discriminated by
//! correlation id (`job_id`). The client never retries; retry policy belongs
//! to the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use crate::broker::Broker;
use crate::error::{BrokerError, WorkerError};
use crate::job::{JobState, WorkerReply};

/// Static configuration for one remote worker.
#[derive(Debug, Clone)]
pub struct WorkerClientConfig {
    /// Diagnostic tag, e.g. "ValidationWorker".
    pub worker_name: String,
    /// Diagnostic tag used in error messages, e.g. "validation".
    pub task_name: String,
    /// Channel this client publishes tasks on.
    pub request_channel: String,
    /// Channel this client awaits replies on.
    pub callback_channel: String,
    /// Deadline for one invocation.
    pub timeout: Duration,
}

/// Caller side of the request/callback protocol.
pub struct WorkerClient {
    broker: Arc<dyn Broker>,
    config: WorkerClientConfig,
}

impl WorkerClient {
    pub fn new(broker: Arc<dyn Broker>, config: WorkerClientConfig) -> Self {
        Self { broker, config }
    }

    /// Publish the state as a task and wait for the correlated reply.
    ///
    /// Subscribes to the callback channel before publishing, so a reply
    /// cannot slip past between the two. Replies for other jobs and
    /// malformed envelopes are skipped; the subscription is torn down on
    /// every exit path.
    pub async fn invoke(&self, state: &JobState) -> Result<JobState, WorkerError> {
        let job_id = state.job_id.clone();
        let mut subscription = self.broker.subscribe(&self.config.callback_channel).await?;

        let payload = serde_json::to_vec(state).map_err(|e| {
            WorkerError::Transport(BrokerError::Publish {
                channel: self.config.request_channel.clone(),
                reason: format!("task for job {job_id} could not be encoded: {e}"),
            })
        })?;
        self.broker
            .publish(&self.config.request_channel, &payload)
            .await?;
        tracing::debug!(
            worker = %self.config.worker_name,
            task = %self.config.task_name,
            job_id = %job_id,
            "published task"
        );

        let wait = async {
            loop {
                let Some(message) = subscription.next().await else {
                    return Err(WorkerError::Transport(BrokerError::Subscribe {
                        channel: self.config.callback_channel.clone(),
                        reason: "subscription closed while waiting for reply".to_string(),
                    }));
                };
                let reply: WorkerReply = match serde_json::from_slice(&message) {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::debug!(
                            worker = %self.config.worker_name,
                            "skipping malformed callback message: {e}"
                        );
                        continue;
                    }
                };
                if reply.job_id != job_id {
                    continue;
                }
                tracing::debug!(
                    worker = %self.config.worker_name,
                    task = %self.config.task_name,
                    job_id = %job_id,
                    "received reply"
                );
                return Ok(reply.result);
            }
        };

        match tokio::time::timeout(self.config.timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Timeout {
                worker_name: self.config.worker_name.clone(),
                job_id,
            }),
        }
    }
}
