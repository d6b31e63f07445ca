//! Cooperative cancellation for the pipeline's suspension points (spec §5:
//! throttle sleep, queue wait, retry backoff). Each sleep races a
//! caller-supplied [`CancellationToken`] rather than polling it, so a
//! cancel signal delivered mid-sleep releases the suspension immediately
//! instead of waiting out the remainder of the interval.

use std::time::Duration;

pub use tokio_util::sync::CancellationToken;

/// Sleeps for `duration`, or returns early if `token` fires first.
/// `Ok(())` means the full duration elapsed uninterrupted; `Err(())` means
/// cancellation won the race. `token = None` is the common case (no
/// cancellation wired up) and always sleeps the full duration.
pub async fn sleep_or_cancel(duration: Duration, token: Option<&CancellationToken>) -> Result<(), ()> {
    match token {
        Some(token) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(()),
                _ = token.cancelled() => Err(()),
            }
        }
        None => {
            tokio::time::sleep(duration).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleeps_full_duration_without_a_token() {
        let start = tokio::time::Instant::now();
        let result = sleep_or_cancel(Duration::from_secs(5), None).await;
        assert!(result.is_ok());
        assert_eq!(tokio::time::Instant::now() - start, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn cancellation_wins_the_race() {
        let token = CancellationToken::new();
        token.cancel();
        let result = sleep_or_cancel(Duration::from_secs(60), Some(&token)).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn uncancelled_token_still_sleeps_full_duration() {
        let token = CancellationToken::new();
        let start = tokio::time::Instant::now();
        let result = sleep_or_cancel(Duration::from_secs(5), Some(&token)).await;
        assert!(result.is_ok());
        assert_eq!(tokio::time::Instant::now() - start, Duration::from_secs(5));
    }
}
