//! Job state machine values.

use serde::{Deserialize, Serialize};

use crate::analyzer::AnalysisSummary;

/// State of the analysis workflow as seen by the presentation layer.
///
/// ```text
/// Idle -> Running(0) -> Running(k+1) | Succeeded | Failed | TimedOut
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// No job run, or the last run was cancelled
    #[default]
    Idle,
    /// Waiting on the backend; `attempt` is the 0-indexed poll about to run
    Running { attempt: u32 },
    /// Backend reported completion and the summary was computed
    Succeeded { result: AnalysisSummary },
    /// Backend call failed; no further attempts are made
    Failed { reason: String },
    /// Retry budget exhausted without completion
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded { .. } | JobState::Failed { .. } | JobState::TimedOut
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(self, JobState::Running { .. })
    }

    /// `true` once nothing more will happen for the current run (terminal or cancelled).
    pub fn is_settled(&self) -> bool {
        self.is_terminal() || matches!(self, JobState::Idle)
    }

    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Running { .. } => "running",
            JobState::Succeeded { .. } => "succeeded",
            JobState::Failed { .. } => "failed",
            JobState::TimedOut => "timed_out",
        }
    }

    /// Collapse the state into the outcome of the job run.
    pub fn outcome(&self) -> JobResult<&AnalysisSummary> {
        match self {
            JobState::Idle | JobState::Running { .. } => JobResult::Pending,
            JobState::Succeeded { result } => JobResult::Succeeded(result),
            JobState::Failed { reason } => JobResult::Failed(reason.clone()),
            JobState::TimedOut => JobResult::TimedOut,
        }
    }
}

/// Outcome of an asynchronous job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum JobResult<T> {
    Pending,
    Succeeded(T),
    Failed(String),
    TimedOut,
}

impl<T> JobResult<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, JobResult::Pending)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> JobResult<U> {
        match self {
            JobResult::Pending => JobResult::Pending,
            JobResult::Succeeded(value) => JobResult::Succeeded(f(value)),
            JobResult::Failed(reason) => JobResult::Failed(reason),
            JobResult::TimedOut => JobResult::TimedOut,
        }
    }

    /// The payload of a successful job, if any.
    pub fn succeeded(self) -> Option<T> {
        match self {
            JobResult::Succeeded(value) => Some(value),
            _ => None,
        }
    }
}

impl From<JobState> for JobResult<AnalysisSummary> {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Idle | JobState::Running { .. } => JobResult::Pending,
            JobState::Succeeded { result } => JobResult::Succeeded(result),
            JobState::Failed { reason } => JobResult::Failed(reason),
            JobState::TimedOut => JobResult::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        assert_eq!(JobState::default(), JobState::Idle);
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Idle.is_terminal());
        assert!(!JobState::Running { attempt: 3 }.is_terminal());
        assert!(JobState::TimedOut.is_terminal());
        assert!(JobState::Failed { reason: "x".into() }.is_terminal());
        assert!(JobState::Idle.is_settled());
    }

    #[test]
    fn outcome_mapping() {
        assert!(JobState::Running { attempt: 0 }.outcome().is_pending());
        assert_eq!(
            JobState::Failed { reason: "boom".into() }.outcome(),
            JobResult::Failed("boom".to_string())
        );
        assert_eq!(JobResult::from(JobState::TimedOut), JobResult::TimedOut);
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_value(JobState::Running { attempt: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"state": "running", "attempt": 2}));
    }
}
