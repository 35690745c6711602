//! Workflow orchestrator: owns the pipeline graph and drives each job
//! through it.
//!
//! One run per job id, started at submission. A run executes nodes strictly
//! in sequence, persists the state after every node, and never throws across
//! its own boundary: every terminal outcome, including worker timeouts and
//! transport failures, ends up in the persisted state.

use std::sync::Arc;

use crate::broker::Broker;
use crate::config::Settings;
use crate::error::{StoreError, SubmitError, WorkerError};
use crate::job::{IngestionJobRequest, JobState, JobStatus, JobStore};
use crate::pipeline::{Node, route_workflow};
use crate::worker::{WorkerClient, WorkerClientConfig};

mod api;
mod listener;

pub use api::{ApiState, router, serve};
pub use listener::CommandListener;

/// One client per remote worker; the routing node needs none.
struct Clients {
    validation: WorkerClient,
    metadata: WorkerClient,
    text: WorkerClient,
    ai: WorkerClient,
    media: WorkerClient,
}

impl Clients {
    fn build(broker: Arc<dyn Broker>, settings: &Settings) -> Self {
        let make = |name: &str, task: &str, cfg: &crate::config::WorkerChannelConfig| {
            WorkerClient::new(
                Arc::clone(&broker),
                WorkerClientConfig {
                    worker_name: name.to_string(),
                    task_name: task.to_string(),
                    request_channel: cfg.request_channel.clone(),
                    callback_channel: cfg.callback_channel.clone(),
                    timeout: cfg.timeout,
                },
            )
        };
        Self {
            validation: make("ValidationWorker", "validation", &settings.workers.validation),
            metadata: make(
                "ExtractMetadataWorker",
                "extract_metadata",
                &settings.workers.metadata,
            ),
            text: make("ExtractTextWorker", "extract_text", &settings.workers.text),
            ai: make("AiWorker", "ai", &settings.workers.ai),
            media: make(
                "MediaProcessingWorker",
                "media_processing",
                &settings.workers.media,
            ),
        }
    }

    fn for_node(&self, node: Node) -> Option<&WorkerClient> {
        match node {
            Node::ValidateFile => Some(&self.validation),
            Node::ExtractMetadata => Some(&self.metadata),
            Node::ExtractText => Some(&self.text),
            Node::AnalyzeImageWithAi | Node::SummarizeDocument => Some(&self.ai),
            Node::GenerateThumbnails
            | Node::ExtractAudio
            | Node::TranscribeAudio
            | Node::GenerateVideoSummary => Some(&self.media),
            Node::RouteWorkflow => None,
        }
    }
}

/// Cheap to clone; every clone shares the same store handle and clients.
#[derive(Clone)]
pub struct Orchestrator {
    store: JobStore,
    clients: Arc<Clients>,
}

impl Orchestrator {
    pub fn new(broker: Arc<dyn Broker>, settings: &Settings) -> Self {
        Self {
            store: JobStore::new(Arc::clone(&broker)),
            clients: Arc::new(Clients::build(broker, settings)),
        }
    }

    /// Accept a new job and start its run in the background.
    ///
    /// The initial state is persisted with an atomic first-writer-wins
    /// create, so a duplicate id (from either the listener or the HTTP
    /// path) leaves the existing state untouched.
    pub async fn submit_job(&self, request: IngestionJobRequest) -> Result<(), SubmitError> {
        let state = JobState::queued(request);
        if !self.store.create(&state).await? {
            return Err(SubmitError::DuplicateJob(state.job_id));
        }
        tracing::info!(
            job_id = %state.job_id,
            content_type = %state.content_type,
            "job queued"
        );

        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.run_job(state).await });
        Ok(())
    }

    /// Read the last persisted state for a job.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobState>, StoreError> {
        self.store.load(job_id).await
    }

    /// Drive one job from the entry node to the sink.
    pub async fn run_job(&self, mut state: JobState) {
        let job_id = state.job_id.clone();
        let mut node = Node::entry();

        loop {
            state = match self.execute(node, state.clone()).await {
                Ok(next_state) => next_state,
                Err(e) => {
                    // Fail fast: timeouts and transport errors are not retried.
                    tracing::error!(job_id = %job_id, node = node.name(), "node failed: {e}");
                    state.fail(format!("failed_at_{}", node.name()), [e.to_string()]);
                    self.persist(&state).await;
                    return;
                }
            };
            self.persist(&state).await;

            match node.successor(&state) {
                Some(next) => node = next,
                None => break,
            }
        }

        if state.status == JobStatus::Failed {
            tracing::warn!(job_id = %job_id, step = %state.step, "pipeline rejected job");
            return;
        }

        state.status = JobStatus::Success;
        state.touch();
        self.persist(&state).await;
        tracing::info!(job_id = %job_id, branch = state.branch.as_str(), "pipeline completed");
    }

    async fn execute(&self, node: Node, state: JobState) -> Result<JobState, WorkerError> {
        tracing::debug!(job_id = %state.job_id, node = node.name(), "entering node");
        match self.clients.for_node(node) {
            Some(client) => client.invoke(&state).await,
            None => Ok(route_workflow(state)),
        }
    }

    async fn persist(&self, state: &JobState) {
        if let Err(e) = self.store.save(state).await {
            tracing::error!(job_id = %state.job_id, "failed to persist job state: {e}");
        }
    }
}
