//! Default structured emitters: a `tracing`-backed `Logger` and a
//! `metrics`-crate-backed `MetricsBackend`, plus the precedence rule that
//! wires them into whatever callback slots explicit builder calls left
//! empty — logging first, metrics second (spec.md §9's redesign note).

use std::sync::Arc;

use secapi_core::{Callback, Callbacks, Config, Event, LogLevel, Logger, MetricsBackend};

/// Builds the final callback set for a client: explicit builder calls are
/// already in `config.callbacks`; this only fills what is still empty.
pub fn wire_defaults(config: &Config) -> Callbacks {
    let mut callbacks = config.callbacks.clone();

    if config.default_logging {
        let logger = config.logger.clone().unwrap_or_else(|| Arc::new(TracingLogger) as Arc<dyn Logger>);
        fill_empty_slots(&mut callbacks, logging_callback(logger, config.log_level));
    }
    if config.default_metrics {
        let backend = config
            .metrics_backend
            .clone()
            .unwrap_or_else(|| Arc::new(MetricsCrateBackend) as Arc<dyn MetricsBackend>);
        fill_empty_slots(&mut callbacks, metrics_callback(backend));
    }

    callbacks
}

fn fill_empty_slots(callbacks: &mut Callbacks, cb: Callback) {
    macro_rules! fill {
        ($($field:ident),* $(,)?) => {
            $(if callbacks.$field.is_none() {
                callbacks.$field = Some(cb.clone());
            })*
        };
    }
    fill!(
        on_request,
        on_response,
        on_retry,
        on_error,
        on_rate_limit,
        on_throttle,
        on_queue,
        on_dequeue,
        on_excessive_wait,
        on_filing,
        on_reconnect,
        on_callback_error,
    );
}

/// Logs every event as one JSON object at the canonical name and severity
/// from the spec.md §4.7 table: retries warn, errors error, everything else
/// at the client's configured base level.
fn logging_callback(logger: Arc<dyn Logger>, base_level: LogLevel) -> Callback {
    Arc::new(move |event: Event| {
        let level = if event.is_warn() {
            LogLevel::Warn
        } else if event.is_error() {
            LogLevel::Error
        } else {
            base_level
        };
        logger.log(level, render_json(&event));
    })
}

fn render_json(event: &Event) -> String {
    let fields = serde_json::json!({ "event": event.canonical_name() });
    let mut obj = fields.as_object().unwrap().clone();
    obj.insert("timestamp".into(), serde_json::json!(now_unix_ms()));

    match event {
        Event::RequestStart { request_id, method, url, .. } => {
            obj.insert("request_id".into(), request_id.as_str().into());
            obj.insert("method".into(), method.as_str().into());
            obj.insert("url".into(), url.as_str().into());
        }
        Event::RequestComplete { request_id, status, duration_ms, .. } => {
            obj.insert("request_id".into(), request_id.as_str().into());
            obj.insert("status".into(), (*status).into());
            obj.insert("duration_ms".into(), (*duration_ms).into());
            obj.insert("success".into(), true.into());
        }
        Event::Retry { request_id, attempt, max_attempts, error_class, will_retry_in_ms, .. } => {
            obj.insert("request_id".into(), request_id.as_str().into());
            obj.insert("attempt".into(), (*attempt).into());
            obj.insert("max_attempts".into(), (*max_attempts).into());
            obj.insert("error_class".into(), (*error_class).into());
            obj.insert("will_retry_in".into(), (*will_retry_in_ms).into());
        }
        Event::RequestError { request_id, error_class, error_message, .. } => {
            obj.insert("request_id".into(), request_id.as_str().into());
            obj.insert("error_class".into(), (*error_class).into());
            obj.insert("error_message".into(), error_message.as_str().into());
        }
        Event::RateLimitExceeded { request_id, retry_after, attempt, .. } => {
            obj.insert("request_id".into(), request_id.as_str().into());
            obj.insert("retry_after".into(), serde_json::json!(retry_after));
            obj.insert("attempt".into(), (*attempt).into());
        }
        Event::Throttle { request_id, remaining, limit, delay_ms, .. } => {
            obj.insert("request_id".into(), request_id.as_str().into());
            obj.insert("remaining".into(), serde_json::json!(remaining));
            obj.insert("limit".into(), serde_json::json!(limit));
            obj.insert("delay".into(), (*delay_ms).into());
        }
        Event::Queue { request_id, queue_size, wait_time_ms, .. } => {
            obj.insert("request_id".into(), request_id.as_str().into());
            obj.insert("queue_size".into(), (*queue_size).into());
            obj.insert("wait_time".into(), (*wait_time_ms).into());
        }
        Event::Dequeue { request_id, queue_size_after, waited_ms } => {
            obj.insert("request_id".into(), request_id.as_str().into());
            obj.insert("queue_size".into(), (*queue_size_after).into());
            obj.insert("waited".into(), (*waited_ms).into());
        }
        Event::ExcessiveWait { request_id, wait_time_ms, threshold_ms, .. } => {
            obj.insert("request_id".into(), request_id.as_str().into());
            obj.insert("wait_time".into(), (*wait_time_ms).into());
            obj.insert("threshold".into(), (*threshold_ms).into());
        }
        Event::Filing { filing, latency_ms, .. } => {
            obj.insert("accession_no".into(), filing.accession_no.as_str().into());
            obj.insert("form_type".into(), filing.form_type.as_str().into());
            obj.insert("latency_ms".into(), (*latency_ms).into());
        }
        Event::Reconnect { attempt_count, downtime_seconds } => {
            obj.insert("attempt_count".into(), (*attempt_count).into());
            obj.insert("downtime_seconds".into(), (*downtime_seconds).into());
        }
        Event::CallbackError { callback, error_class, error_message } => {
            obj.insert("callback".into(), (*callback).into());
            obj.insert("error_class".into(), (*error_class).into());
            obj.insert("error_message".into(), error_message.as_str().into());
        }
    }

    serde_json::Value::Object(obj).to_string()
}

fn now_unix_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// `Logger` implementation backed by `tracing`. The default when
/// `default_logging` is on and no explicit logger was supplied.
struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, line: String) {
        #[cfg(feature = "tracing")]
        match level {
            LogLevel::Debug => tracing::debug!(target: "secapi", "{line}"),
            LogLevel::Info => tracing::info!(target: "secapi", "{line}"),
            LogLevel::Warn => tracing::warn!(target: "secapi", "{line}"),
            LogLevel::Error => tracing::error!(target: "secapi", "{line}"),
        }
        #[cfg(not(feature = "tracing"))]
        {
            let _ = (level, line);
        }
    }
}

/// `MetricsBackend` implementation backed by the `metrics` facade crate.
/// Counter/histogram/gauge names match the spec.md §4.7 table verbatim.
struct MetricsCrateBackend;

impl MetricsBackend for MetricsCrateBackend {
    fn increment(&self, name: &str, tags: &[(&str, &str)]) {
        #[cfg(feature = "metrics")]
        {
            let labels: Vec<(String, String)> =
                tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            metrics::counter!(name.to_string(), &labels).increment(1);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (name, tags);
    }

    fn histogram(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        #[cfg(feature = "metrics")]
        {
            let labels: Vec<(String, String)> =
                tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            metrics::histogram!(name.to_string(), &labels).record(value);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (name, value, tags);
    }

    fn gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]) {
        #[cfg(feature = "metrics")]
        {
            let labels: Vec<(String, String)> =
                tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            metrics::gauge!(name.to_string(), &labels).set(value);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (name, value, tags);
    }
}

/// Maps each event to the counter/histogram/gauge calls from the spec.md
/// §4.7 table. Any exception from the backend is swallowed by the same
/// `catch_unwind` `Callbacks::emit` already wraps every callback in.
///
/// `sec_api.retries.exhausted` isn't mapped from an `Event` here: no event
/// distinguishes "this was the last attempt" from an ordinary retry, so
/// `secapi-retry::RetryStage` increments it directly at the point it gives
/// up, the same way it already does for `sec_api.retries.total`.
fn metrics_callback(backend: Arc<dyn MetricsBackend>) -> Callback {
    Arc::new(move |event: Event| match &event {
        Event::RequestStart { method, .. } => {
            backend.increment("sec_api.requests.total", &[("method", method.as_str())]);
        }
        Event::RequestComplete { status, duration_ms, method, .. } => {
            let status_class = format!("{}xx", status / 100);
            backend.increment(
                "sec_api.requests.success",
                &[("method", method.as_str()), ("status", &status.to_string()), ("status_class", &status_class)],
            );
            backend.histogram(
                "sec_api.requests.duration_ms",
                *duration_ms as f64,
                &[("method", method.as_str())],
            );
        }
        Event::Retry { attempt, error_class, .. } => {
            backend.increment("sec_api.retries.total", &[("attempt", &attempt.to_string()), ("error_class", error_class)]);
        }
        Event::RequestError { error_class, method, .. } => {
            backend.increment("sec_api.requests.error", &[("method", method.as_str()), ("error_class", error_class)]);
        }
        Event::RateLimitExceeded { retry_after, .. } => {
            backend.increment("sec_api.rate_limit.hit", &[]);
            if let Some(ra) = retry_after {
                backend.gauge("sec_api.rate_limit.retry_after", *ra as f64, &[]);
            }
        }
        Event::Throttle { remaining, delay_ms, .. } => {
            backend.increment("sec_api.rate_limit.throttle", &[]);
            backend.histogram("sec_api.rate_limit.delay_ms", *delay_ms as f64, &[]);
            if let Some(r) = remaining {
                backend.gauge("sec_api.rate_limit.remaining", *r as f64, &[]);
            }
        }
        Event::Queue { .. } | Event::Dequeue { .. } | Event::ExcessiveWait { .. } => {}
        Event::Filing { filing, latency_ms, .. } => {
            backend.increment("sec_api.stream.filings", &[("form_type", filing.form_type.as_str())]);
            backend.histogram("sec_api.stream.latency_ms", *latency_ms as f64, &[]);
        }
        Event::Reconnect { downtime_seconds, .. } => {
            backend.increment("sec_api.stream.reconnects", &[]);
            backend.histogram("sec_api.stream.downtime_ms", downtime_seconds * 1000.0, &[]);
        }
        Event::CallbackError { .. } => {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secapi_core::{ConfigBuilder, Method};
    use std::sync::Mutex;

    struct RecordingLogger {
        lines: Mutex<Vec<String>>,
    }

    impl Logger for RecordingLogger {
        fn log(&self, _level: LogLevel, line: String) {
            self.lines.lock().unwrap().push(line);
        }
    }

    #[test]
    fn logging_wires_before_metrics_and_each_fills_only_empty_slots() {
        let logger = Arc::new(RecordingLogger { lines: Mutex::new(Vec::new()) });
        let config = ConfigBuilder::new()
            .api_key("a_real_api_key_1234")
            .default_logging(true)
            .default_metrics(true)
            .logger(logger.clone())
            .on_request(|_, _, _, _| {})
            .build()
            .unwrap();

        let callbacks = wire_defaults(&config);

        assert!(callbacks.on_request.is_some());
        assert!(callbacks.on_response.is_some());

        (callbacks.on_response.unwrap())(Event::RequestComplete {
            request_id: "r".into(),
            status: 200,
            duration_ms: 5,
            url: "https://x".into(),
            method: Method::Get,
        });
        assert_eq!(logger.lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn neither_default_leaves_slots_empty() {
        let config = ConfigBuilder::new().api_key("a_real_api_key_1234").build().unwrap();
        let callbacks = wire_defaults(&config);
        assert!(callbacks.on_request.is_none());
        assert!(callbacks.on_response.is_none());
    }
}
