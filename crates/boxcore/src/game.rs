use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// The game was asked to stop while suspended. An expected signal, caught
/// at the orchestrator boundary and turned into a state transition.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("game stopped")]
pub struct Stopped;

/// How a supervised game run ended, from the orchestrator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Completed,
    Faulted,
    TimedOut,
    Cancelled,
}

/// Uniform lifecycle for everything the orchestrator can run. A game is
/// created by its registry factory, runs exactly once and is dropped
/// afterwards; `run` must select on `stop` at every suspension point so
/// that cancellation produces an orderly abort rather than a hang.
#[async_trait]
pub trait Game: Send {
    async fn run(&mut self, stop: CancellationToken) -> Result<()>;
}

/// Cancellation-aware pacing delay.
pub async fn pause(stop: &CancellationToken, duration: Duration) -> Result<()> {
    tokio::select! {
        _ = stop.cancelled() => Err(Stopped.into()),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Runs a fallible operation, aborting early when the stop token fires.
pub async fn with_stop<T, E, F>(stop: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T, E>> + Send,
    E: Into<anyhow::Error> + Send,
{
    tokio::select! {
        _ = stop.cancelled() => Err(Stopped.into()),
        result = operation => result.map_err(Into::into),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_completes_when_not_stopped() {
        let stop = CancellationToken::new();
        pause(&stop, Duration::from_millis(5)).await.expect("pause");
    }

    #[tokio::test]
    async fn pause_aborts_on_stop() {
        let stop = CancellationToken::new();
        stop.cancel();

        let err = pause(&stop, Duration::from_secs(60))
            .await
            .expect_err("stopped");
        assert!(err.is::<Stopped>());
    }

    #[tokio::test]
    async fn with_stop_passes_through_results() {
        let stop = CancellationToken::new();
        let value = with_stop(&stop, async { Ok::<_, anyhow::Error>(7) })
            .await
            .expect("value");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn with_stop_aborts_pending_operations() {
        let stop = CancellationToken::new();
        stop.cancel();

        let err = with_stop(&stop, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .expect_err("stopped");
        assert!(err.is::<Stopped>());
    }
}
