//! The job state carried through the pipeline, plus the wire envelopes
//! exchanged with the gateway and the workers.
//!
//! All payloads are UTF-8 JSON. `JobState` is the single source of truth per
//! job; it is created at submission, mutated only by the orchestrator run
//! that owns it, and persisted after every node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event name carried by ingestion events on the command channel.
pub const JOB_CREATED_EVENT: &str = "JOB_CREATED";

/// The per-content-type sub-pipeline a job is routed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Branch {
    /// Not routed yet; serializes as the empty string.
    #[default]
    #[serde(rename = "")]
    Unrouted,
    #[serde(rename = "image_branch")]
    Image,
    #[serde(rename = "video_branch")]
    Video,
    #[serde(rename = "pdf_branch")]
    Pdf,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Unrouted => "",
            Branch::Image => "image_branch",
            Branch::Video => "video_branch",
            Branch::Pdf => "pdf_branch",
        }
    }
}

/// Job status.
///
/// `success` and `failed` are terminal: once persisted, no later write may
/// change the status again. Intermediate progress lives in `step` and
/// `metadata`, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "queued")]
    Queued,
    #[serde(rename = "routed_to_image_branch")]
    RoutedToImageBranch,
    #[serde(rename = "routed_to_video_branch")]
    RoutedToVideoBranch,
    #[serde(rename = "routed_to_pdf_branch")]
    RoutedToPdfBranch,
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failed")]
    Failed,
}

impl JobStatus {
    /// The routed status for a branch. Routing never targets `Unrouted`.
    pub fn routed_to(branch: Branch) -> Self {
        match branch {
            Branch::Image | Branch::Unrouted => JobStatus::RoutedToImageBranch,
            Branch::Video => JobStatus::RoutedToVideoBranch,
            Branch::Pdf => JobStatus::RoutedToPdfBranch,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

/// Job submission contract shared by the gateway event and `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionJobRequest {
    pub job_id: String,
    pub file_path: String,
    pub content_type: String,
    pub checksum_sha256: String,
    #[serde(default)]
    pub submitted_by: Option<String>,
}

/// Envelope published on the command channel when an upload lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreatedEvent {
    pub event: String,
    #[serde(flatten)]
    pub job: IngestionJobRequest,
}

impl JobCreatedEvent {
    pub fn new(job: IngestionJobRequest) -> Self {
        Self {
            event: JOB_CREATED_EVENT.to_string(),
            job,
        }
    }
}

/// Envelope a worker publishes on its callback channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReply {
    pub job_id: String,
    pub result: JobState,
}

/// The evolving state of one ingestion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    pub file_path: String,
    pub content_type: String,
    pub checksum_sha256: String,
    #[serde(default)]
    pub submitted_by: Option<String>,
    pub status: JobStatus,
    pub step: String,
    #[serde(default)]
    pub branch: Branch,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl JobState {
    /// Build the initial queued state for a submission.
    pub fn queued(request: IngestionJobRequest) -> Self {
        let now = Utc::now();
        Self {
            job_id: request.job_id,
            file_path: request.file_path,
            content_type: request.content_type,
            checksum_sha256: request.checksum_sha256,
            submitted_by: request.submitted_by,
            status: JobStatus::Queued,
            step: "queued".to_string(),
            branch: Branch::Unrouted,
            created_at: now,
            updated_at: now,
            metadata: Map::new(),
        }
    }

    /// Stamp `updated_at`. Called on every transition.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Merge a worker result under one top-level metadata key.
    ///
    /// Workers accumulate results side by side; nothing here removes or
    /// replaces a sibling key owned by another worker.
    pub fn merge_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }

    /// Append error messages to the `errors` list, creating it if needed.
    pub fn push_errors(&mut self, errors: impl IntoIterator<Item = String>) {
        let entry = self
            .metadata
            .entry("errors".to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = entry {
            list.extend(errors.into_iter().map(Value::String));
        }
    }

    /// Mark the job failed at the given step, recording the errors.
    pub fn fail(&mut self, step: impl Into<String>, errors: impl IntoIterator<Item = String>) {
        self.status = JobStatus::Failed;
        self.step = step.into();
        self.push_errors(errors);
        self.touch();
    }
}
