//! Worker service skeleton: the remote side of the request/callback protocol.
//!
//! A worker subscribes to its request channel, runs its handler on every
//! decoded state, and publishes `{job_id, result}` on its callback channel.
//! Handler errors become a published `failed` state; a request is never
//! dropped without a trace.

use std::sync::Arc;

use async_trait::async_trait;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::broker::Broker;
use crate::error::BrokerError;
use crate::job::{JobState, WorkerReply};

/// A worker body: pure state-in, state-out.
#[async_trait]
pub trait WorkerHandler: Send + Sync {
    /// Task tag used for step names and diagnostics, e.g. "validate_file".
    fn task_name(&self) -> &str;

    /// Process one job state.
    ///
    /// Business-level rejection is expressed by returning a state with
    /// `status == failed`; `Err` is reserved for unexpected handler failures
    /// and is converted into a failed state by the service.
    async fn process(&self, state: JobState) -> anyhow::Result<JobState>;
}

/// Subscribe/process/reply loop around one handler.
pub struct WorkerService {
    broker: Arc<dyn Broker>,
    handler: Arc<dyn WorkerHandler>,
    request_channel: String,
    callback_channel: String,
}

impl WorkerService {
    pub fn new(
        broker: Arc<dyn Broker>,
        handler: Arc<dyn WorkerHandler>,
        request_channel: impl Into<String>,
        callback_channel: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            handler,
            request_channel: request_channel.into(),
            callback_channel: callback_channel.into(),
        }
    }

    /// Serve requests until the subscription ends.
    ///
    /// Workers are stateless between messages; everything a request needs is
    /// in its payload.
    pub async fn run(&self) -> Result<(), BrokerError> {
        let mut subscription = self.broker.subscribe(&self.request_channel).await?;
        tracing::info!(
            task = %self.handler.task_name(),
            channel = %self.request_channel,
            "worker listening"
        );

        while let Some(payload) = subscription.next().await {
            self.handle_message(&payload).await;
        }

        tracing::info!(task = %self.handler.task_name(), "worker subscription ended");
        Ok(())
    }

    async fn handle_message(&self, payload: &[u8]) {
        let state: JobState = match serde_json::from_slice(payload) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    task = %self.handler.task_name(),
                    "discarding request that does not decode to a job state: {e}"
                );
                return;
            }
        };
        let job_id = state.job_id.clone();
        tracing::info!(task = %self.handler.task_name(), job_id = %job_id, "processing request");

        let result = match self.handler.process(state.clone()).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    task = %self.handler.task_name(),
                    job_id = %job_id,
                    "handler failed: {e:#}"
                );
                let mut failed = state;
                failed.fail(
                    format!("{}_failed", self.handler.task_name()),
                    [e.to_string()],
                );
                failed
            }
        };

        let reply = WorkerReply {
            job_id: job_id.clone(),
            result,
        };
        let bytes = match serde_json::to_vec(&reply) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(job_id = %job_id, "reply could not be encoded: {e}");
                return;
            }
        };
        if let Err(e) = self.broker.publish(&self.callback_channel, &bytes).await {
            tracing::error!(job_id = %job_id, "reply could not be published: {e}");
        } else {
            tracing::info!(task = %self.handler.task_name(), job_id = %job_id, "published result");
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
}

/// Liveness router served by every worker process.
pub fn health_router(service_name: impl Into<String>) -> Router {
    let service = service_name.into();
    Router::new().route(
        "/health",
        get(move || {
            let service = service.clone();
            async move {
                Json(HealthResponse {
                    status: "healthy",
                    service,
                })
            }
        }),
    )
}
