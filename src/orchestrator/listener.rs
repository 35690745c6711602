//! Ingress listener: turns `JOB_CREATED` events into orchestrator runs.

use std::sync::Arc;

use crate::broker::Broker;
use crate::error::{BrokerError, SubmitError};
use crate::job::{JOB_CREATED_EVENT, JobCreatedEvent};
use crate::orchestrator::Orchestrator;

pub struct CommandListener {
    broker: Arc<dyn Broker>,
    orchestrator: Arc<Orchestrator>,
    channel: String,
}

impl CommandListener {
    pub fn new(
        broker: Arc<dyn Broker>,
        orchestrator: Arc<Orchestrator>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            orchestrator,
            channel: channel.into(),
        }
    }

    /// Listen until the subscription ends. The caller decides whether a
    /// dropped broker connection warrants a resubscribe.
    pub async fn run(&self) -> Result<(), BrokerError> {
        let mut subscription = self.broker.subscribe(&self.channel).await?;
        tracing::info!(channel = %self.channel, "listening for JOB_CREATED events");

        while let Some(payload) = subscription.next().await {
            self.handle(&payload).await;
        }

        tracing::info!(channel = %self.channel, "command listener subscription ended");
        Ok(())
    }

    async fn handle(&self, payload: &[u8]) {
        let event: JobCreatedEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(channel = %self.channel, "skipping malformed event: {e}");
                return;
            }
        };
        if event.event != JOB_CREATED_EVENT {
            tracing::debug!(event = %event.event, "ignoring non-creation event");
            return;
        }

        let job_id = event.job.job_id.clone();
        tracing::info!(job_id = %job_id, "received JOB_CREATED event");
        match self.orchestrator.submit_job(event.job).await {
            Ok(()) => {}
            Err(SubmitError::DuplicateJob(id)) => {
                tracing::info!(job_id = %id, "duplicate job event dropped");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, "event submission failed: {e}");
            }
        }
    }
}
