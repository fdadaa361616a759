//! Time source for the poll loop.

use std::time::Duration;

use async_trait::async_trait;

/// Suspends a job run between steps.
///
/// Runs race every sleep against their cancellation token, so implementations
/// only need to be cancel-safe (dropping the future must be harmless).
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    async fn sleep(&self, duration: Duration);
}

/// Real time via `tokio::time`. Honors `tokio::time::pause()` in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        tokio::time::sleep(duration).await;
    }
}
