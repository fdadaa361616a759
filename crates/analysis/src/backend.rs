//! Analysis backend seam.
//!
//! The controller only needs two calls: submit a job, then ask whether it is
//! done. [`DeterministicBackend`] answers locally with a fixed rule; an HTTP
//! implementation lives in `spendwise-infra`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use spendwise_core::ExpenseRecord;

use crate::error::BackendError;

/// Backend-side identifier of a submitted analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Answer to a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub complete: bool,
}

impl JobStatus {
    pub fn complete() -> Self {
        Self { complete: true }
    }

    pub fn pending() -> Self {
        Self { complete: false }
    }
}

/// Remote analysis service.
#[async_trait]
pub trait JobStatusBackend: Send + Sync + 'static {
    /// Submit the records for analysis and return the job handle to poll.
    async fn submit(&self, expenses: &[ExpenseRecord]) -> Result<JobHandle, BackendError>;

    /// Query job completion. `attempt` is the 0-indexed poll number within the run.
    async fn query_job_status(
        &self,
        handle: &JobHandle,
        attempt: u32,
    ) -> Result<JobStatus, BackendError>;
}

/// Local stand-in for a real analysis service.
///
/// Reports completion from poll index `complete_from_attempt` onwards (1 by
/// default, i.e. the second poll). `None` never completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeterministicBackend {
    complete_from_attempt: Option<u32>,
}

impl DeterministicBackend {
    pub fn new() -> Self {
        Self::completing_at(1)
    }

    pub fn completing_at(attempt: u32) -> Self {
        Self {
            complete_from_attempt: Some(attempt),
        }
    }

    pub fn never_completing() -> Self {
        Self {
            complete_from_attempt: None,
        }
    }
}

impl Default for DeterministicBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStatusBackend for DeterministicBackend {
    async fn submit(&self, _expenses: &[ExpenseRecord]) -> Result<JobHandle, BackendError> {
        Ok(JobHandle::new())
    }

    async fn query_job_status(
        &self,
        _handle: &JobHandle,
        attempt: u32,
    ) -> Result<JobStatus, BackendError> {
        let complete = self
            .complete_from_attempt
            .is_some_and(|threshold| attempt >= threshold);
        Ok(JobStatus { complete })
    }
}
