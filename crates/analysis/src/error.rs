use spendwise_core::ExpenseId;
use thiserror::Error;

/// Errors of the analysis workflow.
///
/// `NoDataToAnalyze` and `InvalidRecord` are returned synchronously from
/// [`crate::AnalysisJobController::start`]. `BackendQueryFailed` never reaches the
/// caller of `start`; it only shows up as the reason of a published
/// [`crate::JobState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("no expenses to analyze")]
    NoDataToAnalyze,

    #[error("invalid expense record {expense_id}: {reason}")]
    InvalidRecord { expense_id: ExpenseId, reason: String },

    #[error("backend query failed: {reason}")]
    BackendQueryFailed { reason: String },
}

impl AnalysisError {
    /// Precondition errors are fixed by the caller, never by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::BackendQueryFailed { .. })
    }
}

/// Failure of a single call into a [`crate::JobStatusBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BackendError> for AnalysisError {
    fn from(err: BackendError) -> Self {
        AnalysisError::BackendQueryFailed {
            reason: err.to_string(),
        }
    }
}
