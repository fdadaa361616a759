//! `spendwise-analysis`
//!
//! **Responsibility:** the asynchronous "analyze my expenses" workflow.
//!
//! - [`ExpenseAnalyzer`] is pure: records in, [`AnalysisSummary`] out.
//! - [`AnalysisJobController`] owns one job run at a time (start, poll, retry,
//!   timeout, cancel) and publishes every [`JobState`] transition in order.
//! - The backend and the clock are traits so the placeholder completion rule and
//!   real time can both be swapped out.

pub mod analyzer;
pub mod backend;
pub mod clock;
pub mod controller;
pub mod error;
pub mod policy;
pub mod publisher;
pub mod state;

pub use analyzer::{AnalysisSummary, ExpenseAnalyzer, NO_TOP_CATEGORY};
pub use backend::{DeterministicBackend, JobHandle, JobStatus, JobStatusBackend};
pub use clock::{Clock, TokioClock};
pub use controller::{AnalysisJobController, RunId};
pub use error::{AnalysisError, BackendError};
pub use policy::PollPolicy;
pub use publisher::{StatePublisher, StateSubscription};
pub use state::{JobResult, JobState};
