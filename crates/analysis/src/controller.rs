//! Analysis job controller: one job run at a time, polled with a bounded budget.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use spendwise_core::ExpenseRecord;

use crate::analyzer::ExpenseAnalyzer;
use crate::backend::{DeterministicBackend, JobHandle, JobStatusBackend};
use crate::clock::{Clock, TokioClock};
use crate::error::{AnalysisError, BackendError};
use crate::policy::PollPolicy;
use crate::publisher::{StatePublisher, StateSubscription};
use crate::state::JobState;

/// Sequence number of a job run within one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(pub u64);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Drives the "analyze my expenses" workflow and publishes its [`JobState`].
///
/// - `start` validates synchronously, cancels any in-flight run, publishes
///   `Running(0)` and spawns the run task.
/// - The run waits `submission_delay`, submits, then polls every
///   `poll_interval` until the backend reports completion, the budget runs out,
///   or a backend call fails.
/// - Every wait and backend call races the run's cancellation token; a
///   cancelled run never publishes again.
///
/// Construct one per screen/session and share it by `Arc`; there is no global instance.
pub struct AnalysisJobController {
    analyzer: ExpenseAnalyzer,
    backend: Arc<dyn JobStatusBackend>,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
    publisher: Arc<StatePublisher>,
    active: Mutex<Option<ActiveRun>>,
    run_seq: AtomicU64,
}

struct ActiveRun {
    id: RunId,
    token: CancellationToken,
    _task: JoinHandle<()>,
}

impl AnalysisJobController {
    pub fn new(backend: Arc<dyn JobStatusBackend>, policy: PollPolicy) -> Self {
        Self {
            analyzer: ExpenseAnalyzer::new(),
            backend,
            clock: Arc::new(TokioClock),
            policy: policy.normalized(),
            publisher: Arc::new(StatePublisher::new()),
            active: Mutex::new(None),
            run_seq: AtomicU64::new(0),
        }
    }

    /// Controller with the deterministic placeholder backend and the default policy.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(DeterministicBackend::default()), PollPolicy::default())
    }

    /// Replace the time source (synthetic clocks in tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> JobState {
        self.publisher.current()
    }

    /// Subscribe to every transition published from now on.
    pub fn subscribe(&self) -> StateSubscription {
        self.publisher.subscribe()
    }

    /// Id of the run currently owning the state, if any.
    pub fn active_run(&self) -> Option<RunId> {
        self.lock_active().as_ref().map(|run| run.id)
    }

    /// Start a new job run over `expenses`.
    ///
    /// Fails synchronously, without touching the state, on empty input
    /// (`NoDataToAnalyze`) or malformed amounts (`InvalidRecord`). Backend
    /// failures are only ever reported through the published state.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, expenses: Vec<ExpenseRecord>) -> Result<RunId, AnalysisError> {
        if expenses.is_empty() {
            return Err(AnalysisError::NoDataToAnalyze);
        }
        self.analyzer.validate(&expenses)?;

        let mut active = self.lock_active();

        // The previous token is cancelled before the new run's first publish, so
        // any late publish from the old run is rejected by the publisher.
        if let Some(previous) = active.take() {
            previous.token.cancel();
            debug!(run_id = %previous.id, "superseded analysis run");
        }

        let id = RunId(self.run_seq.fetch_add(1, Ordering::Relaxed) + 1);
        let token = CancellationToken::new();
        let record_count = expenses.len();

        self.publisher.publish(JobState::Running { attempt: 0 });

        let run = JobRun {
            id,
            token: token.clone(),
            expenses,
            analyzer: self.analyzer,
            backend: self.backend.clone(),
            clock: self.clock.clone(),
            policy: self.policy,
            publisher: self.publisher.clone(),
        };
        let task = tokio::spawn(supervise(run));

        *active = Some(ActiveRun {
            id,
            token,
            _task: task,
        });

        info!(
            run_id = %id,
            records = record_count,
            max_attempts = self.policy.max_attempts,
            "analysis run started"
        );
        Ok(id)
    }

    /// Cancel the in-flight run and return to `Idle`. No-op unless `Running`.
    pub fn cancel(&self) {
        let mut active = self.lock_active();
        let Some(run) = active.as_ref() else {
            return;
        };
        if self.publisher.cancel_running(&run.token) {
            info!(run_id = %run.id, "analysis run cancelled");
            *active = None;
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AnalysisJobController {
    fn drop(&mut self) {
        if let Some(run) = self.lock_active().take() {
            run.token.cancel();
        }
    }
}

/// Everything one run task owns.
struct JobRun {
    id: RunId,
    token: CancellationToken,
    expenses: Vec<ExpenseRecord>,
    analyzer: ExpenseAnalyzer,
    backend: Arc<dyn JobStatusBackend>,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
    publisher: Arc<StatePublisher>,
}

impl JobRun {
    /// Run `fut` unless the run is cancelled first.
    async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Cancellable sleep; `false` when the run was cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        self.guard(self.clock.sleep(duration)).await.is_some()
    }

    fn publish(&self, state: JobState) -> bool {
        let label = state.label();
        let published = self.publisher.publish_for_run(&self.token, state);
        if !published {
            debug!(run_id = %self.id, state = label, "suppressed transition of cancelled run");
        }
        published
    }

    fn fail(&self, attempt: Option<u32>, err: BackendError) {
        let err = AnalysisError::from(err);
        warn!(run_id = %self.id, attempt = ?attempt, error = %err, "analysis run failed");
        self.publish(JobState::Failed {
            reason: err.to_string(),
        });
    }

    async fn submit(&self) -> Option<JobHandle> {
        match self.guard(self.backend.submit(&self.expenses)).await? {
            Ok(handle) => {
                debug!(run_id = %self.id, job = %handle, "analysis job submitted");
                Some(handle)
            }
            Err(err) => {
                self.fail(None, err);
                None
            }
        }
    }
}

/// Run the job in a child task so that a panic still settles the state.
async fn supervise(run: JobRun) {
    let id = run.id;
    let token = run.token.clone();
    let publisher = run.publisher.clone();

    if let Err(err) = tokio::spawn(drive(run)).await {
        if err.is_panic() {
            error!(run_id = %id, "analysis run panicked");
            publisher.publish_for_run(
                &token,
                JobState::Failed {
                    reason: "analysis run panicked".to_string(),
                },
            );
        }
    }
}

async fn drive(run: JobRun) {
    if !run.pause(run.policy.submission_delay).await {
        return;
    }
    let Some(handle) = run.submit().await else {
        return;
    };

    let mut attempt: u32 = 0;
    loop {
        if !run.pause(run.policy.poll_interval).await {
            return;
        }

        let status = match run
            .guard(run.backend.query_job_status(&handle, attempt))
            .await
        {
            None => return,
            Some(Ok(status)) => status,
            Some(Err(err)) => {
                run.fail(Some(attempt), err);
                return;
            }
        };
        debug!(run_id = %run.id, attempt, complete = status.complete, "polled analysis job");

        if status.complete {
            if run.token.is_cancelled() {
                return;
            }
            let state = match run.analyzer.analyze(&run.expenses) {
                Ok(summary) => {
                    info!(
                        run_id = %run.id,
                        attempt,
                        total_spent = summary.total_spent,
                        top_category = %summary.top_category,
                        "analysis run succeeded"
                    );
                    JobState::Succeeded { result: summary }
                }
                Err(err) => JobState::Failed {
                    reason: err.to_string(),
                },
            };
            run.publish(state);
            return;
        }

        if !run.policy.allows_attempt_after(attempt) {
            info!(run_id = %run.id, attempts = attempt + 1, "analysis run timed out");
            run.publish(JobState::TimedOut);
            return;
        }

        attempt += 1;
        if !run.publish(JobState::Running { attempt }) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use spendwise_core::{ExpenseId, OwnerId};

    fn records() -> Vec<ExpenseRecord> {
        vec![
            ExpenseRecord::new(
                ExpenseId::parse("exp-1").unwrap(),
                OwnerId::parse("owner-1").unwrap(),
                "2024-03-01",
                10.0,
                "Food",
            )
            .unwrap(),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn run_ids_increase_per_start() {
        let controller = AnalysisJobController::with_defaults();
        let first = controller.start(records()).unwrap();
        let second = controller.start(records()).unwrap();

        assert!(second > first);
        assert_eq!(controller.active_run(), Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_clears_active_run() {
        let controller = AnalysisJobController::with_defaults();
        controller.start(records()).unwrap();
        controller.cancel();

        assert_eq!(controller.active_run(), None);
        assert_eq!(controller.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn rejected_start_keeps_previous_run() {
        let controller = AnalysisJobController::with_defaults();
        let id = controller.start(records()).unwrap();

        assert_eq!(controller.start(Vec::new()), Err(AnalysisError::NoDataToAnalyze));
        assert_eq!(controller.active_run(), Some(id));
        assert!(controller.state().is_running());
    }
}
