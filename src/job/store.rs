//! Job-state persistence over the broker's key/value side-channel.

use std::sync::Arc;

use crate::broker::Broker;
use crate::error::StoreError;
use crate::job::JobState;

/// Key prefix for persisted job states.
const KEY_PREFIX: &str = "job_state:";

/// Persists the evolving `JobState`, keyed by job id.
#[derive(Clone)]
pub struct JobStore {
    broker: Arc<dyn Broker>,
}

impl JobStore {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    fn key(job_id: &str) -> String {
        format!("{KEY_PREFIX}{job_id}")
    }

    /// Persist an initial state, failing if one already exists for this job.
    ///
    /// First writer wins; the check-and-set is atomic at the broker, so the
    /// listener and the HTTP submit path cannot both create the same job.
    pub async fn create(&self, state: &JobState) -> Result<bool, StoreError> {
        let bytes = encode(state)?;
        Ok(self
            .broker
            .set_if_absent(&Self::key(&state.job_id), &bytes)
            .await?)
    }

    /// Persist the current state, overwriting the previous snapshot.
    pub async fn save(&self, state: &JobState) -> Result<(), StoreError> {
        let bytes = encode(state)?;
        self.broker.set(&Self::key(&state.job_id), &bytes).await?;
        Ok(())
    }

    /// Load the last persisted state for a job, if any.
    pub async fn load(&self, job_id: &str) -> Result<Option<JobState>, StoreError> {
        let Some(bytes) = self.broker.get(&Self::key(job_id)).await? else {
            return Ok(None);
        };
        let state = serde_json::from_slice(&bytes).map_err(|e| StoreError::Codec {
            job_id: job_id.to_string(),
            op: "decoded",
            source: e,
        })?;
        Ok(Some(state))
    }
}

fn encode(state: &JobState) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(state).map_err(|e| StoreError::Codec {
        job_id: state.job_id.clone(),
        op: "encoded",
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::broker::MemoryBroker;
    use crate::job::IngestionJobRequest;

    fn state(job_id: &str) -> JobState {
        JobState::queued(IngestionJobRequest {
            job_id: job_id.to_string(),
            file_path: "/tmp/x.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            checksum_sha256: "b".repeat(64),
            submitted_by: None,
        })
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = JobStore::new(MemoryBroker::new());
        let s = state("j1");
        store.save(&s).await.unwrap();
        let loaded = store.load("j1").await.unwrap().unwrap();
        assert_eq!(loaded, s);
    }

    #[tokio::test]
    async fn create_rejects_second_writer() {
        let store = JobStore::new(MemoryBroker::new());
        assert!(store.create(&state("j2")).await.unwrap());
        assert!(!store.create(&state("j2")).await.unwrap());
    }

    #[tokio::test]
    async fn load_unknown_job_is_none() {
        let store = JobStore::new(MemoryBroker::new());
        assert!(store.load("missing").await.unwrap().is_none());
    }
}
