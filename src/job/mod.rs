//! Job data model and persistence.

mod state;
mod store;

pub use state::{
    Branch, IngestionJobRequest, JOB_CREATED_EVENT, JobCreatedEvent, JobState, JobStatus,
    WorkerReply,
};
pub use store::JobStore;
