//! The retry stage: wraps the inner chain (rate-limiter → classifier →
//! transport) and retries `TransientError` up to the configured bound.
//! `PermanentError` and `ConfigurationError` propagate on the first
//! occurrence. Plain function composition, not a generic `tower::Service` —
//! the chain order is fixed, so there is nothing to be generic over.

use std::future::Future;
use std::sync::Arc;

use secapi_core::cancellation::sleep_or_cancel;
use secapi_core::error::{CancelledError, Error};
use secapi_core::{Callbacks, Event, RateLimitError, RawResponse, RequestEnv};

use crate::config::RetryConfig;
use crate::hints::{now_unix, override_wait};

pub struct RetryStage {
    config: RetryConfig,
    callbacks: Arc<Callbacks>,
}

impl RetryStage {
    pub fn new(config: RetryConfig, callbacks: Arc<Callbacks>) -> Self {
        Self { config, callbacks }
    }

    /// Drives `inner` to completion, retrying on `TransientError` until
    /// `max_attempts` is reached. `env.attempt` is advanced in place so
    /// callers downstream (e.g. instrumentation) can read the final count.
    pub async fn call<F, Fut>(&self, env: &mut RequestEnv, inner: F) -> Result<RawResponse, Error>
    where
        F: FnMut(&mut RequestEnv) -> Fut,
        Fut: Future<Output = Result<RawResponse, Error>>,
    {
        self.call_with_max_attempts(env, None, inner).await
    }

    /// Same as [`Self::call`], but honors a per-call `max_attempts` override
    /// (`RequestDescriptor::per_call_overrides`) ahead of the client default.
    pub async fn call_with_max_attempts<F, Fut>(
        &self,
        env: &mut RequestEnv,
        max_attempts_override: Option<usize>,
        mut inner: F,
    ) -> Result<RawResponse, Error>
    where
        F: FnMut(&mut RequestEnv) -> Fut,
        Fut: Future<Output = Result<RawResponse, Error>>,
    {
        let config = match max_attempts_override {
            Some(max_attempts) => self.config.with_max_attempts(max_attempts),
            None => self.config.clone(),
        };
        let max_attempts = config.max_attempts.max(1);
        let backoff = config.backoff();

        loop {
            match inner(env).await {
                Ok(response) => return Ok(response),
                Err(Error::Transient(transient)) => {
                    if env.attempt >= max_attempts {
                        #[cfg(feature = "metrics")]
                        metrics::counter!("sec_api.retries.exhausted").increment(1);
                        return Err(Error::Transient(transient));
                    }

                    let rate_limit = transient.as_rate_limit();
                    if let Some(rl) = rate_limit {
                        self.emit_rate_limit(env, rl);
                    }

                    let wait = rate_limit
                        .and_then(|rl| override_wait(rl, config.max_delay, now_unix()))
                        .unwrap_or_else(|| backoff.next_interval(env.attempt.saturating_sub(1)));

                    self.callbacks.emit(Event::Retry {
                        request_id: env.request_id.clone(),
                        attempt: env.attempt,
                        max_attempts,
                        error_class: transient.class_name(),
                        error_message: transient.to_string(),
                        will_retry_in_ms: wait.as_millis() as u64,
                    });

                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        request_id = %env.request_id,
                        attempt = env.attempt,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        "secapi retry"
                    );
                    #[cfg(feature = "metrics")]
                    metrics::counter!("sec_api.retries.total").increment(1);

                    if sleep_or_cancel(wait, env.cancellation.as_ref()).await.is_err() {
                        return Err(Error::Cancelled(CancelledError {
                            request_id: env.request_id.clone(),
                            message: secapi_core::error::prefix_request_id(
                                &env.request_id,
                                "cancelled during retry backoff",
                            ),
                        }));
                    }
                    env.attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn emit_rate_limit(&self, env: &RequestEnv, rl: &RateLimitError) {
        self.callbacks.emit(Event::RateLimitExceeded {
            request_id: env.request_id.clone(),
            retry_after: rl.retry_after,
            reset_at: rl.reset_at,
            attempt: env.attempt,
        });
        #[cfg(feature = "metrics")]
        metrics::counter!("sec_api.rate_limit.hit").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secapi_core::{
        NetworkError, NetworkErrorKind, PermanentError, ServerError, TransientError, ValidationError,
    };
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn ok_response() -> RawResponse {
        RawResponse { status: 200, headers: BTreeMap::new(), body: Vec::new() }
    }

    fn server_error(attempt: usize) -> Error {
        Error::Transient(TransientError::Server(ServerError {
            request_id: "r".into(),
            message: format!("[r] server error on attempt {attempt}"),
            status: 503,
            headers: BTreeMap::new(),
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: std::time::Duration::from_millis(10),
            max_delay: std::time::Duration::from_millis(100),
            backoff_factor: 2.0,
        };
        let retry_count = Arc::new(AtomicUsize::new(0));
        let stage = RetryStage::new(config, Arc::new(Callbacks::default()));
        let mut env = RequestEnv::new("r".into());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let result = stage
            .call(&mut env, move |_env| {
                let n = calls2.fetch_add(1, Ordering::SeqCst);
                let retry_count = retry_count.clone();
                async move {
                    if n < 2 {
                        retry_count.fetch_add(1, Ordering::SeqCst);
                        Err(server_error(n))
                    } else {
                        Ok(ok_response())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(env.attempt, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_retries_and_returns_last_error() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(10),
            backoff_factor: 2.0,
        };
        let stage = RetryStage::new(config, Arc::new(Callbacks::default()));
        let mut env = RequestEnv::new("r".into());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let result = stage
            .call(&mut env, move |_env| {
                let n = calls2.fetch_add(1, Ordering::SeqCst);
                async move { Err(server_error(n)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(10),
            backoff_factor: 2.0,
        };
        let stage = RetryStage::new(config, Arc::new(Callbacks::default()));
        let mut env = RequestEnv::new("r".into());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let result = stage
            .call(&mut env, move |_env| {
                calls2.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(Error::Permanent(PermanentError::Validation(ValidationError {
                        request_id: "r".into(),
                        message: "[r] bad request".into(),
                        status: 400,
                        headers: BTreeMap::new(),
                    })))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn on_retry_fires_with_attempts_one_and_two() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(10),
            backoff_factor: 2.0,
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let mut callbacks = Callbacks::default();
        callbacks.on_retry = Some(Arc::new(move |event| {
            if let Event::Retry { attempt, .. } = event {
                seen2.lock().unwrap().push(attempt);
            }
        }));
        let stage = RetryStage::new(config, Arc::new(callbacks));
        let mut env = RequestEnv::new("r".into());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let _ = stage
            .call(&mut env, move |_env| {
                let n = calls2.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(server_error(n))
                    } else {
                        Ok(ok_response())
                    }
                }
            })
            .await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn cancellation_during_backoff_returns_cancelled_not_transient() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: std::time::Duration::from_secs(60),
            max_delay: std::time::Duration::from_secs(60),
            backoff_factor: 2.0,
        };
        let stage = RetryStage::new(config, Arc::new(Callbacks::default()));
        let token = secapi_core::CancellationToken::new();
        token.cancel();
        let mut env = RequestEnv::new("r".into()).with_cancellation(Some(token));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let result = stage
            .call(&mut env, move |_env| {
                calls2.fetch_add(1, Ordering::SeqCst);
                async move { Err(server_error(0)) }
            })
            .await;

        assert!(matches!(result, Err(Error::Cancelled(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn network_error_kind_is_exhaustive_for_classification() {
        let _ = NetworkErrorKind::Timeout;
        let _ = NetworkErrorKind::ConnectionRefused;
        let _ = NetworkErrorKind::Tls;
        let _ = NetworkErrorKind::Other;
        let _ = NetworkError {
            request_id: "r".into(),
            message: "timeout".into(),
            kind: NetworkErrorKind::Timeout,
            headers: BTreeMap::new(),
        };
    }
}
