//! Ordered fan-out of job state transitions.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::state::JobState;

/// Owner of the current [`JobState`].
///
/// Every transition is applied and fanned out while holding one lock, so all
/// subscribers observe the same total order and a snapshot read never sees a
/// half-applied transition.
#[derive(Debug, Default)]
pub struct StatePublisher {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    current: JobState,
    subscribers: Vec<mpsc::UnboundedSender<JobState>>,
}

impl StatePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the latest state.
    pub fn current(&self) -> JobState {
        self.lock().current.clone()
    }

    /// Subscribe to every transition published from now on.
    pub fn subscribe(&self) -> StateSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        StateSubscription { receiver: rx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Apply and fan out a transition unconditionally.
    pub fn publish(&self, state: JobState) {
        let mut inner = self.lock();
        Self::apply(&mut inner, state);
    }

    /// Publish on behalf of a job run; suppressed once the run's token is cancelled.
    ///
    /// Returns `false` when suppressed.
    pub(crate) fn publish_for_run(&self, token: &CancellationToken, state: JobState) -> bool {
        let mut inner = self.lock();
        if token.is_cancelled() {
            return false;
        }
        Self::apply(&mut inner, state);
        true
    }

    /// Cancel `token` and publish `Idle`, but only while the state is `Running`.
    ///
    /// The check, the cancellation and the publish happen under one lock, so the
    /// run cannot slip a terminal state in between.
    pub(crate) fn cancel_running(&self, token: &CancellationToken) -> bool {
        let mut inner = self.lock();
        if !inner.current.is_running() {
            return false;
        }
        token.cancel();
        Self::apply(&mut inner, JobState::Idle);
        true
    }

    fn apply(inner: &mut Inner, state: JobState) {
        // Drop any dead subscribers while publishing.
        inner
            .subscribers
            .retain(|tx| tx.send(state.clone()).is_ok());
        inner.current = state;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ordered stream of transitions for one subscriber.
#[derive(Debug)]
pub struct StateSubscription {
    receiver: mpsc::UnboundedReceiver<JobState>,
}

impl StateSubscription {
    /// Wait for the next transition. `None` once the publisher is gone.
    pub async fn next(&mut self) -> Option<JobState> {
        self.receiver.recv().await
    }

    /// Next transition if one is already queued.
    pub fn try_next(&mut self) -> Option<JobState> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued right now, in publish order.
    pub fn drain(&mut self) -> Vec<JobState> {
        let mut states = Vec::new();
        while let Some(state) = self.try_next() {
            states.push(state);
        }
        states
    }

    /// Wait until a terminal or `Idle` state arrives and return it.
    pub async fn settle(&mut self) -> Option<JobState> {
        while let Some(state) = self.next().await {
            if state.is_settled() {
                return Some(state);
            }
        }
        None
    }
}
