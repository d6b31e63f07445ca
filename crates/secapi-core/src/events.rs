//! Lifecycle events, callback slots, and the logging/metrics backend traits
//! that the default emitters (in `secapi-pipeline`) implement against.
//!
//! Each of the twelve callback slots named in the config table gets its own
//! `Option` field on [`Callbacks`] rather than a single shared listener list,
//! so that "default logging wires first, default metrics wires second, each
//! only fills slots still empty" can be expressed as plain field assignment.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::filing::StreamFiling;
use crate::request::Method;
use std::collections::BTreeMap;

/// One occurrence worth reporting to a callback, the logger, or the metrics
/// backend. Carries exactly the fields the corresponding `on_*` slot in the
/// config table documents.
#[derive(Debug, Clone)]
pub enum Event {
    RequestStart {
        request_id: String,
        method: Method,
        url: String,
        headers_sanitized: BTreeMap<String, String>,
    },
    RequestComplete {
        request_id: String,
        status: u16,
        duration_ms: u64,
        url: String,
        method: Method,
    },
    Retry {
        request_id: String,
        attempt: usize,
        max_attempts: usize,
        error_class: &'static str,
        error_message: String,
        will_retry_in_ms: u64,
    },
    RequestError {
        request_id: String,
        error_class: &'static str,
        error_message: String,
        url: String,
        method: Method,
    },
    RateLimitExceeded {
        request_id: String,
        retry_after: Option<i64>,
        reset_at: Option<i64>,
        attempt: usize,
    },
    Throttle {
        request_id: String,
        remaining: Option<u64>,
        limit: Option<u64>,
        delay_ms: u64,
        reset_at: Option<i64>,
    },
    Queue {
        request_id: String,
        queue_size: u64,
        wait_time_ms: u64,
        reset_at: Option<i64>,
    },
    Dequeue {
        request_id: String,
        queue_size_after: u64,
        waited_ms: u64,
    },
    ExcessiveWait {
        request_id: String,
        wait_time_ms: u64,
        threshold_ms: u64,
        reset_at: Option<i64>,
    },
    Filing {
        filing: StreamFiling,
        latency_ms: i64,
        received_at: i64,
    },
    Reconnect {
        attempt_count: usize,
        downtime_seconds: f64,
    },
    CallbackError {
        callback: &'static str,
        error_class: &'static str,
        error_message: String,
    },
}

impl Event {
    /// Canonical dotted name used by the default logging and metrics
    /// emitters. Matches the table in the config documentation.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Event::RequestStart { .. } => "secapi.request.start",
            Event::RequestComplete { .. } => "secapi.request.complete",
            Event::Retry { .. } => "secapi.request.retry",
            Event::RequestError { .. } => "secapi.request.error",
            Event::RateLimitExceeded { .. } => "secapi.rate_limit.exceeded",
            Event::Throttle { .. } => "secapi.rate_limit.throttle",
            Event::Queue { .. } => "secapi.rate_limit.queue",
            Event::Dequeue { .. } => "secapi.rate_limit.dequeue",
            Event::ExcessiveWait { .. } => "secapi.rate_limit.excessive_wait",
            Event::Filing { .. } => "secapi.stream.filing",
            Event::Reconnect { .. } => "secapi.stream.reconnect",
            Event::CallbackError { .. } => "secapi.callback_error",
        }
    }

    /// Fixed severity per event kind: retries warn, errors error, everything
    /// else logs at the configured base level.
    pub fn is_warn(&self) -> bool {
        matches!(self, Event::Retry { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Event::RequestError { .. } | Event::CallbackError { .. })
    }
}

/// Minimal logging sink a [`Config`](crate::config::Config) can hold. The
/// default JSON emitter in `secapi-pipeline` implements this against
/// `tracing`; callers may supply their own.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, line: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Duck-typed metrics sink. Implementations that cannot support tags or
/// histograms are expected to degrade gracefully (e.g. fall back to a
/// counter-only view) rather than panic; the pipeline never inspects which
/// capabilities a given backend has beyond calling these three methods.
pub trait MetricsBackend: Send + Sync {
    fn increment(&self, name: &str, tags: &[(&str, &str)]);
    fn histogram(&self, name: &str, value: f64, tags: &[(&str, &str)]);
    fn gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]);
}

pub type Callback = Arc<dyn Fn(Event) + Send + Sync>;

/// The twelve optional callback slots from the config table. Populated by
/// explicit builder calls first, then by the default logging and metrics
/// emitters (in that order) for whichever slots are still empty.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_request: Option<Callback>,
    pub on_response: Option<Callback>,
    pub on_retry: Option<Callback>,
    pub on_error: Option<Callback>,
    pub on_rate_limit: Option<Callback>,
    pub on_throttle: Option<Callback>,
    pub on_queue: Option<Callback>,
    pub on_dequeue: Option<Callback>,
    pub on_excessive_wait: Option<Callback>,
    pub on_filing: Option<Callback>,
    pub on_reconnect: Option<Callback>,
    pub on_callback_error: Option<Callback>,
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_request", &self.on_request.is_some())
            .field("on_response", &self.on_response.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_rate_limit", &self.on_rate_limit.is_some())
            .field("on_throttle", &self.on_throttle.is_some())
            .field("on_queue", &self.on_queue.is_some())
            .field("on_dequeue", &self.on_dequeue.is_some())
            .field("on_excessive_wait", &self.on_excessive_wait.is_some())
            .field("on_filing", &self.on_filing.is_some())
            .field("on_reconnect", &self.on_reconnect.is_some())
            .field("on_callback_error", &self.on_callback_error.is_some())
            .finish()
    }
}

impl Callbacks {
    /// Invokes the slot matching `event`'s variant, if set. A panic inside
    /// the user callback is caught (mirroring the teacher's
    /// `EventListeners::emit`), logged, and routed to `on_callback_error`
    /// without ever failing the caller or skipping a later callback.
    pub fn emit(&self, event: Event) {
        let slot = self.slot_for(&event);
        if let Some(cb) = slot {
            let name = slot_name(&event);
            let result = catch_unwind(AssertUnwindSafe(|| cb(event)));
            if let Err(payload) = result {
                let message = panic_message(&payload);
                self.report_callback_error(name, message);
            }
        }
    }

    fn slot_for(&self, event: &Event) -> Option<&Callback> {
        match event {
            Event::RequestStart { .. } => self.on_request.as_ref(),
            Event::RequestComplete { .. } => self.on_response.as_ref(),
            Event::Retry { .. } => self.on_retry.as_ref(),
            Event::RequestError { .. } => self.on_error.as_ref(),
            Event::RateLimitExceeded { .. } => self.on_rate_limit.as_ref(),
            Event::Throttle { .. } => self.on_throttle.as_ref(),
            Event::Queue { .. } => self.on_queue.as_ref(),
            Event::Dequeue { .. } => self.on_dequeue.as_ref(),
            Event::ExcessiveWait { .. } => self.on_excessive_wait.as_ref(),
            Event::Filing { .. } => self.on_filing.as_ref(),
            Event::Reconnect { .. } => self.on_reconnect.as_ref(),
            Event::CallbackError { .. } => self.on_callback_error.as_ref(),
        }
    }

    fn report_callback_error(&self, callback: &'static str, message: String) {
        #[cfg(feature = "tracing")]
        tracing::error!(callback, %message, "secapi.callback_error");
        #[cfg(feature = "metrics")]
        metrics::counter!("sec_api.callbacks.error", "callback" => callback).increment(1);

        if let Some(cb) = &self.on_callback_error {
            let event = Event::CallbackError {
                callback,
                error_class: "CallbackPanic",
                error_message: message,
            };
            // Deliberately not re-entering `emit`: a panicking error callback
            // must not recurse into itself.
            let _ = catch_unwind(AssertUnwindSafe(|| cb(event)));
        }
    }
}

fn slot_name(event: &Event) -> &'static str {
    match event {
        Event::RequestStart { .. } => "on_request",
        Event::RequestComplete { .. } => "on_response",
        Event::Retry { .. } => "on_retry",
        Event::RequestError { .. } => "on_error",
        Event::RateLimitExceeded { .. } => "on_rate_limit",
        Event::Throttle { .. } => "on_throttle",
        Event::Queue { .. } => "on_queue",
        Event::Dequeue { .. } => "on_dequeue",
        Event::ExcessiveWait { .. } => "on_excessive_wait",
        Event::Filing { .. } => "on_filing",
        Event::Reconnect { .. } => "on_reconnect",
        Event::CallbackError { .. } => "on_callback_error",
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emits_to_matching_slot_only() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let mut callbacks = Callbacks::default();
        callbacks.on_retry = Some(Arc::new(move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        }));

        callbacks.emit(Event::RequestComplete {
            request_id: "r".into(),
            status: 200,
            duration_ms: 1,
            url: "https://x".into(),
            method: Method::Get,
        });
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        callbacks.emit(Event::Retry {
            request_id: "r".into(),
            attempt: 1,
            max_attempts: 3,
            error_class: "ServerError",
            error_message: "boom".into(),
            will_retry_in_ms: 10,
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_callback_is_caught_and_routed_to_callback_error() {
        let mut callbacks = Callbacks::default();
        callbacks.on_retry = Some(Arc::new(|_| panic!("user callback exploded")));

        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        callbacks.on_callback_error = Some(Arc::new(move |event| {
            if let Event::CallbackError { callback, .. } = event {
                assert_eq!(callback, "on_retry");
                seen2.fetch_add(1, Ordering::SeqCst);
            }
        }));

        callbacks.emit(Event::Retry {
            request_id: "r".into(),
            attempt: 1,
            max_attempts: 3,
            error_class: "ServerError",
            error_message: "boom".into(),
            will_retry_in_ms: 10,
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
