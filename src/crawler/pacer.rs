//! Politeness delays and cancellation
//!
//! Every sleep and every network call of a crawl goes through a [`Pacer`],
//! which races it against the shared cancellation token. Tests swap the
//! [`Sleeper`] for one that records requested delays instead of waiting.

use crate::{ArchiveError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Source of delays
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Real time via `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Applies delays and observes cancellation
#[derive(Debug, Clone)]
pub struct Pacer<S> {
    sleeper: S,
    cancel: CancellationToken,
}

impl<S: Sleeper> Pacer<S> {
    pub fn new(sleeper: S, cancel: CancellationToken) -> Self {
        Self { sleeper, cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Fails with `UserAbort` if cancellation was requested
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(ArchiveError::UserAbort)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration` unless cancelled first
    pub async fn pause(&self, duration: Duration) -> Result<()> {
        self.checkpoint()?;
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ArchiveError::UserAbort),
            _ = self.sleeper.sleep(duration) => Ok(()),
        }
    }

    /// Runs `fut` unless cancelled first
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.checkpoint()?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ArchiveError::UserAbort),
            result = fut => result,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::recording_pacer;
    use super::*;

    #[tokio::test]
    async fn test_pause_records_delay() {
        let (pacer, sleeper) = recording_pacer();
        pacer.pause(Duration::from_millis(600)).await.unwrap();
        pacer.pause(Duration::ZERO).await.unwrap();
        assert_eq!(sleeper.calls(), vec![Duration::from_millis(600)]);
    }

    #[tokio::test]
    async fn test_cancelled_pacer_aborts() {
        let (pacer, sleeper) = recording_pacer();
        pacer.cancel_token().cancel();

        assert!(matches!(
            pacer.pause(Duration::from_secs(1)).await,
            Err(ArchiveError::UserAbort)
        ));
        assert!(matches!(
            pacer.guard(async { Ok(1) }).await,
            Err(ArchiveError::UserAbort)
        ));
        assert!(sleeper.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_real_sleep() {
        let cancel = CancellationToken::new();
        let pacer = Pacer::new(TokioSleeper, cancel.clone());
        let handle = tokio::spawn(async move { pacer.pause(Duration::from_secs(3600)).await });
        cancel.cancel();
        assert!(matches!(handle.await.unwrap(), Err(ArchiveError::UserAbort)));
    }
}
