//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Errors from the broker gateway (pub/sub and the job-state KV side-channel).
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Could not reach or authenticate with the broker.
    #[error("broker connection failed: {reason}")]
    Connection { reason: String },

    /// A publish did not go through.
    #[error("publish to '{channel}' failed: {reason}")]
    Publish { channel: String, reason: String },

    /// A subscription could not be established.
    #[error("subscribe to '{channel}' failed: {reason}")]
    Subscribe { channel: String, reason: String },

    /// A key/value operation on the state store failed.
    #[error("key/value {op} for '{key}' failed: {reason}")]
    KeyValue {
        op: &'static str,
        key: String,
        reason: String,
    },
}

/// Errors from invoking a remote worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// No correlated callback arrived within the deadline.
    #[error("{worker_name} timed out waiting for a reply for job {job_id}")]
    Timeout { worker_name: String, job_id: String },

    /// The broker became unusable mid-invocation.
    #[error(transparent)]
    Transport(#[from] BrokerError),
}

/// Errors from the job-state store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// The stored document could not be encoded or decoded.
    #[error("job state for {job_id} could not be {op}: {source}")]
    Codec {
        job_id: String,
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from submitting a new job.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// A state for this job id already exists; the existing state is untouched.
    #[error("job {0} already exists")]
    DuplicateJob(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
