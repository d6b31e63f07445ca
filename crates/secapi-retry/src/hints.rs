//! Per-attempt schedule override for `RateLimitError`, used instead of the
//! default exponential schedule when the server told us exactly how long to
//! wait.

use std::time::Duration;

use secapi_core::error::RateLimitError;

/// Priority: `retry_after` (already parsed from either the integer-seconds
/// or HTTP-date form of `Retry-After` by the classifier) first, then
/// `reset_at` (from `X-RateLimit-Reset`) as a fallback. `None` means neither
/// hint was present, so the caller should fall back to the default
/// exponential schedule.
///
/// A negative `retry_after` is preserved verbatim on the error for
/// observability but is treated as a zero wait here, not as "no hint" — see
/// the open-question resolution in DESIGN.md.
pub fn override_wait(err: &RateLimitError, max_delay: Duration, now_unix: i64) -> Option<Duration> {
    if let Some(retry_after) = err.retry_after {
        let secs = retry_after.max(0) as u64;
        return Some(Duration::from_secs(secs).min(max_delay));
    }
    if let Some(reset_at) = err.reset_at {
        let secs = (reset_at - now_unix).max(0) as u64;
        return Some(Duration::from_secs(secs).min(max_delay));
    }
    None
}

pub fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn err(retry_after: Option<i64>, reset_at: Option<i64>) -> RateLimitError {
        RateLimitError {
            request_id: "r".into(),
            message: "rate limited".into(),
            status: 429,
            retry_after,
            reset_at,
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn retry_after_wins_over_reset_at() {
        let e = err(Some(1), Some(1_000_000));
        let wait = override_wait(&e, Duration::from_secs(60), 0).unwrap();
        assert_eq!(wait, Duration::from_secs(1));
    }

    #[test]
    fn negative_retry_after_is_zero_wait_not_default_schedule() {
        let e = err(Some(-30), None);
        let wait = override_wait(&e, Duration::from_secs(60), 0).unwrap();
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn reset_at_in_past_is_zero_wait() {
        let e = err(None, Some(100));
        let wait = override_wait(&e, Duration::from_secs(60), 1_000).unwrap();
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn wait_is_capped_by_max_delay() {
        let e = err(Some(3_600), None);
        let wait = override_wait(&e, Duration::from_secs(30), 0).unwrap();
        assert_eq!(wait, Duration::from_secs(30));
    }

    #[test]
    fn no_hint_returns_none() {
        let e = err(None, None);
        assert!(override_wait(&e, Duration::from_secs(30), 0).is_none());
    }
}
