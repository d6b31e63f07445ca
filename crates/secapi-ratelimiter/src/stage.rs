//! The rate-limiter stage: header sink on the way back, proactive throttle
//! and request queueing on the way in. Sits between retry and the
//! classifier, so `inner` here is "classifier → transport" — the `Error`
//! it returns is already classified, which is why the header sink also
//! reads `Error::headers()` on the failure path.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use secapi_core::cancellation::sleep_or_cancel;
use secapi_core::error::{CancelledError, Error};
use secapi_core::{Callbacks, Event, RateLimitTracker, RawResponse, RequestEnv};

use crate::config::{RateLimiterConfig, DEFAULT_QUEUE_WAIT};
use crate::guard::QueueGuard;
use crate::headers;

pub struct RateLimiterStage {
    config: RateLimiterConfig,
    tracker: Arc<RateLimitTracker>,
    callbacks: Arc<Callbacks>,
}

impl RateLimiterStage {
    pub fn new(config: RateLimiterConfig, tracker: Arc<RateLimitTracker>, callbacks: Arc<Callbacks>) -> Self {
        Self { config, tracker, callbacks }
    }

    pub async fn call<F, Fut>(&self, env: &mut RequestEnv, inner: F) -> Result<RawResponse, Error>
    where
        F: FnOnce(&mut RequestEnv) -> Fut,
        Fut: Future<Output = Result<RawResponse, Error>>,
    {
        self.throttle(env).await?;
        self.queue(env).await?;
        let result = inner(env).await;
        self.sink(&result);
        result
    }

    fn cancelled(&self, env: &RequestEnv, during: &str) -> Error {
        Error::Cancelled(CancelledError {
            request_id: env.request_id.clone(),
            message: secapi_core::error::prefix_request_id(&env.request_id, format!("cancelled during {during}")),
        })
    }

    /// §4.4.2: proactive throttling on entry, before descending.
    async fn throttle(&self, env: &RequestEnv) -> Result<(), Error> {
        let state = self.tracker.current_state();
        let now = now_unix();

        let Some(pct) = state.percentage_remaining() else { return Ok(()) };
        if pct / 100.0 >= self.config.threshold {
            return Ok(());
        }
        let Some(reset_at) = state.reset_at else { return Ok(()) };
        if reset_at <= now {
            return Ok(());
        }

        let delay = Duration::from_secs((reset_at - now) as u64);
        if sleep_or_cancel(delay, env.cancellation.as_ref()).await.is_err() {
            return Err(self.cancelled(env, "throttle wait"));
        }

        self.callbacks.emit(Event::Throttle {
            request_id: env.request_id.clone(),
            remaining: state.remaining,
            limit: state.limit,
            delay_ms: delay.as_millis() as u64,
            reset_at: Some(reset_at),
        });
        #[cfg(feature = "metrics")]
        metrics::counter!("sec_api.rate_limit.throttle").increment(1);
        Ok(())
    }

    /// §4.4.3: request queueing. Returns a guard kept alive only for the
    /// wait itself, not the downstream call — the counter tracks requests
    /// currently *waiting*, released the moment the wait ends (including on
    /// cancellation, via the guard's `Drop`).
    async fn queue(&self, env: &RequestEnv) -> Result<(), Error> {
        let state = self.tracker.current_state();
        if state.remaining != Some(0) {
            return Ok(());
        }
        let now = now_unix();
        if state.reset_at.is_some_and(|r| r <= now) {
            return Ok(());
        }

        let (guard, queue_size) =
            QueueGuard::enter(self.tracker.clone(), self.callbacks.clone(), env.request_id.clone());

        let wait_time = match state.reset_at {
            Some(reset_at) => Duration::from_secs((reset_at - now).max(0) as u64),
            None => DEFAULT_QUEUE_WAIT,
        };

        self.callbacks.emit(Event::Queue {
            request_id: env.request_id.clone(),
            queue_size,
            wait_time_ms: wait_time.as_millis() as u64,
            reset_at: state.reset_at,
        });

        if wait_time > self.config.queue_wait_warning_threshold {
            self.callbacks.emit(Event::ExcessiveWait {
                request_id: env.request_id.clone(),
                wait_time_ms: wait_time.as_millis() as u64,
                threshold_ms: self.config.queue_wait_warning_threshold.as_millis() as u64,
                reset_at: state.reset_at,
            });
        }

        let slept = sleep_or_cancel(wait_time, env.cancellation.as_ref()).await;
        drop(guard);
        if slept.is_err() {
            return Err(self.cancelled(env, "queue wait"));
        }
        Ok(())
    }

    /// §4.4.1: header sink, applied on every response including errors.
    fn sink(&self, result: &Result<RawResponse, Error>) {
        let headers = match result {
            Ok(response) => Some(&response.headers),
            Err(err) => err.headers(),
        };
        if let Some(headers) = headers {
            let (limit, remaining, reset_at) = headers::extract(headers);
            self.tracker.update(limit, remaining, reset_at);
        }
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
