//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race an operation against its deadline and an optional caller token
//! - Report which source interrupted it
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities
//! - A token cancelled before the call interrupts immediately
//! - Dropping the operation future is the cancellation; nothing else is torn down

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Why an operation did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// The deadline fired first.
    TimedOut(Duration),
    /// The caller's token fired first.
    Cancelled,
}

/// Run `fut` under a deadline and an optional cancellation token.
pub async fn with_deadline<F>(
    fut: F,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<F::Output, Interruption>
where
    F: Future,
{
    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancelled => Err(Interruption::Cancelled),
        _ = tokio::time::sleep(timeout) => Err(Interruption::TimedOut(timeout)),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_in_time() {
        let out = with_deadline(async { 7 }, Duration::from_secs(1), None).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let slow = tokio::time::sleep(Duration::from_secs(10));
        let out = with_deadline(slow, Duration::from_secs(4), None).await;
        assert_eq!(out, Err(Interruption::TimedOut(Duration::from_secs(4))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins_over_timeout() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let slow = tokio::time::sleep(Duration::from_secs(10));
        let out = with_deadline(slow, Duration::from_secs(4), Some(&token)).await;
        assert_eq!(out, Err(Interruption::Cancelled));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();
        let out = with_deadline(async { 1 }, Duration::from_secs(4), Some(&token)).await;
        assert_eq!(out, Err(Interruption::Cancelled));
    }
}
