//! Immutable, validated client configuration.
//!
//! Built via [`ConfigBuilder`] in the teacher's builder-with-defaults idiom.
//! [`ConfigBuilder::from_env`] overlays `SECAPI_*` environment variables
//! onto the defaults before explicit builder calls run, so the precedence
//! is: explicit builder call > environment variable > built-in default.
//! (YAML-file loading sits a layer above environment variables in the full
//! config contract; parsing it is an out-of-scope adapter's job, so it is
//! not implemented here — `from_env` only ever sees env vars.)

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::events::{Callback, Callbacks, Event, LogLevel, Logger, MetricsBackend};
use crate::request::Method;

const PLACEHOLDER_MARKERS: &[&str] = &["changeme", "your_api_key", "your-api-key", "placeholder", "xxxxxxxxxx"];

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub retry_max_attempts: usize,
    pub retry_initial_delay: Duration,
    pub retry_max_delay: Duration,
    pub retry_backoff_factor: f64,
    pub rate_limit_threshold: f64,
    pub queue_wait_warning_threshold: Duration,
    pub stream_max_reconnect_attempts: usize,
    pub stream_initial_reconnect_delay: Duration,
    pub stream_max_reconnect_delay: Duration,
    pub stream_backoff_multiplier: f64,
    pub stream_latency_warning_threshold: Duration,
    pub callbacks: Callbacks,
    pub logger: Option<Arc<dyn Logger>>,
    pub log_level: LogLevel,
    pub default_logging: bool,
    pub metrics_backend: Option<Arc<dyn MetricsBackend>>,
    pub default_metrics: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_initial_delay", &self.retry_initial_delay)
            .field("retry_max_delay", &self.retry_max_delay)
            .field("retry_backoff_factor", &self.retry_backoff_factor)
            .field("rate_limit_threshold", &self.rate_limit_threshold)
            .field("queue_wait_warning_threshold", &self.queue_wait_warning_threshold)
            .field("stream_max_reconnect_attempts", &self.stream_max_reconnect_attempts)
            .field("stream_initial_reconnect_delay", &self.stream_initial_reconnect_delay)
            .field("stream_max_reconnect_delay", &self.stream_max_reconnect_delay)
            .field("stream_backoff_multiplier", &self.stream_backoff_multiplier)
            .field("stream_latency_warning_threshold", &self.stream_latency_warning_threshold)
            .field("callbacks", &self.callbacks)
            .field("default_logging", &self.default_logging)
            .field("default_metrics", &self.default_metrics)
            .finish()
    }
}

pub struct ConfigBuilder {
    api_key: Option<String>,
    base_url: String,
    request_timeout: Duration,
    retry_max_attempts: usize,
    retry_initial_delay: Duration,
    retry_max_delay: Duration,
    retry_backoff_factor: f64,
    rate_limit_threshold: f64,
    queue_wait_warning_threshold: Duration,
    stream_max_reconnect_attempts: usize,
    stream_initial_reconnect_delay: Duration,
    stream_max_reconnect_delay: Duration,
    stream_backoff_multiplier: f64,
    stream_latency_warning_threshold: Duration,
    callbacks: Callbacks,
    logger: Option<Arc<dyn Logger>>,
    log_level: LogLevel,
    default_logging: bool,
    metrics_backend: Option<Arc<dyn MetricsBackend>>,
    default_metrics: bool,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.sec-api.io".to_string(),
            request_timeout: Duration::from_secs(30),
            retry_max_attempts: 3,
            retry_initial_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            retry_backoff_factor: 2.0,
            rate_limit_threshold: 0.1,
            queue_wait_warning_threshold: Duration::from_secs(5),
            stream_max_reconnect_attempts: 10,
            stream_initial_reconnect_delay: Duration::from_secs(1),
            stream_max_reconnect_delay: Duration::from_secs(60),
            stream_backoff_multiplier: 2.0,
            stream_latency_warning_threshold: Duration::from_secs(5),
            callbacks: Callbacks::default(),
            logger: None,
            log_level: LogLevel::Info,
            default_logging: false,
            metrics_backend: None,
            default_metrics: false,
        }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlays `SECAPI_*` environment variables onto the defaults. Values
    /// set here are themselves overridden by any explicit builder call made
    /// afterwards, preserving explicit > env > default.
    pub fn from_env() -> Self {
        let mut builder = Self::default();
        if let Ok(v) = std::env::var("SECAPI_API_KEY") {
            builder.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("SECAPI_BASE_URL") {
            builder.base_url = v;
        }
        if let Some(v) = std::env::var("SECAPI_REQUEST_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()) {
            builder.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = std::env::var("SECAPI_RETRY_MAX_ATTEMPTS").ok().and_then(|s| s.parse().ok()) {
            builder.retry_max_attempts = v;
        }
        if let Some(v) = std::env::var("SECAPI_RETRY_INITIAL_DELAY_MS").ok().and_then(|s| s.parse().ok()) {
            builder.retry_initial_delay = Duration::from_millis(v);
        }
        if let Some(v) = std::env::var("SECAPI_RETRY_MAX_DELAY_MS").ok().and_then(|s| s.parse().ok()) {
            builder.retry_max_delay = Duration::from_millis(v);
        }
        if let Some(v) = std::env::var("SECAPI_RETRY_BACKOFF_FACTOR").ok().and_then(|s| s.parse().ok()) {
            builder.retry_backoff_factor = v;
        }
        if let Some(v) = std::env::var("SECAPI_RATE_LIMIT_THRESHOLD").ok().and_then(|s| s.parse().ok()) {
            builder.rate_limit_threshold = v;
        }
        builder
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn retry_max_attempts(mut self, attempts: usize) -> Self {
        self.retry_max_attempts = attempts;
        self
    }

    pub fn retry_initial_delay(mut self, delay: Duration) -> Self {
        self.retry_initial_delay = delay;
        self
    }

    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.retry_max_delay = delay;
        self
    }

    pub fn retry_backoff_factor(mut self, factor: f64) -> Self {
        self.retry_backoff_factor = factor;
        self
    }

    pub fn rate_limit_threshold(mut self, threshold: f64) -> Self {
        self.rate_limit_threshold = threshold;
        self
    }

    pub fn queue_wait_warning_threshold(mut self, threshold: Duration) -> Self {
        self.queue_wait_warning_threshold = threshold;
        self
    }

    pub fn stream_max_reconnect_attempts(mut self, attempts: usize) -> Self {
        self.stream_max_reconnect_attempts = attempts;
        self
    }

    pub fn stream_initial_reconnect_delay(mut self, delay: Duration) -> Self {
        self.stream_initial_reconnect_delay = delay;
        self
    }

    pub fn stream_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.stream_max_reconnect_delay = delay;
        self
    }

    pub fn stream_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.stream_backoff_multiplier = multiplier;
        self
    }

    pub fn stream_latency_warning_threshold(mut self, threshold: Duration) -> Self {
        self.stream_latency_warning_threshold = threshold;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn default_logging(mut self, enabled: bool) -> Self {
        self.default_logging = enabled;
        self
    }

    pub fn metrics_backend(mut self, backend: Arc<dyn MetricsBackend>) -> Self {
        self.metrics_backend = Some(backend);
        self
    }

    pub fn default_metrics(mut self, enabled: bool) -> Self {
        self.default_metrics = enabled;
        self
    }

    pub fn on_request<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Method, &str, &BTreeMap<String, String>) + Send + Sync + 'static,
    {
        self.callbacks.on_request = Some(wrap(move |event| {
            if let Event::RequestStart { request_id, method, url, headers_sanitized } = event {
                f(&request_id, method, &url, &headers_sanitized);
            }
        }));
        self
    }

    pub fn on_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u16, u64, &str, Method) + Send + Sync + 'static,
    {
        self.callbacks.on_response = Some(wrap(move |event| {
            if let Event::RequestComplete { request_id, status, duration_ms, url, method } = event {
                f(&request_id, status, duration_ms, &url, method);
            }
        }));
        self
    }

    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize, usize, &str, &str, u64) + Send + Sync + 'static,
    {
        self.callbacks.on_retry = Some(wrap(move |event| {
            if let Event::Retry { request_id, attempt, max_attempts, error_class, error_message, will_retry_in_ms } = event {
                f(&request_id, attempt, max_attempts, error_class, &error_message, will_retry_in_ms);
            }
        }));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, &str, &str, Method) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(wrap(move |event| {
            if let Event::RequestError { request_id, error_class, error_message, url, method } = event {
                f(&request_id, error_class, &error_message, &url, method);
            }
        }));
        self
    }

    pub fn on_rate_limit<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<i64>, Option<i64>, usize) + Send + Sync + 'static,
    {
        self.callbacks.on_rate_limit = Some(wrap(move |event| {
            if let Event::RateLimitExceeded { request_id, retry_after, reset_at, attempt } = event {
                f(&request_id, retry_after, reset_at, attempt);
            }
        }));
        self
    }

    pub fn on_throttle<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<u64>, Option<u64>, u64, Option<i64>) + Send + Sync + 'static,
    {
        self.callbacks.on_throttle = Some(wrap(move |event| {
            if let Event::Throttle { request_id, remaining, limit, delay_ms, reset_at } = event {
                f(&request_id, remaining, limit, delay_ms, reset_at);
            }
        }));
        self
    }

    pub fn on_queue<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u64, u64, Option<i64>) + Send + Sync + 'static,
    {
        self.callbacks.on_queue = Some(wrap(move |event| {
            if let Event::Queue { request_id, queue_size, wait_time_ms, reset_at } = event {
                f(&request_id, queue_size, wait_time_ms, reset_at);
            }
        }));
        self
    }

    pub fn on_dequeue<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u64, u64) + Send + Sync + 'static,
    {
        self.callbacks.on_dequeue = Some(wrap(move |event| {
            if let Event::Dequeue { request_id, queue_size_after, waited_ms } = event {
                f(&request_id, queue_size_after, waited_ms);
            }
        }));
        self
    }

    pub fn on_excessive_wait<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u64, u64, Option<i64>) + Send + Sync + 'static,
    {
        self.callbacks.on_excessive_wait = Some(wrap(move |event| {
            if let Event::ExcessiveWait { request_id, wait_time_ms, threshold_ms, reset_at } = event {
                f(&request_id, wait_time_ms, threshold_ms, reset_at);
            }
        }));
        self
    }

    pub fn on_filing<F>(mut self, f: F) -> Self
    where
        F: Fn(&crate::filing::StreamFiling, i64, i64) + Send + Sync + 'static,
    {
        self.callbacks.on_filing = Some(wrap(move |event| {
            if let Event::Filing { filing, latency_ms, received_at } = event {
                f(&filing, latency_ms, received_at);
            }
        }));
        self
    }

    pub fn on_reconnect<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, f64) + Send + Sync + 'static,
    {
        self.callbacks.on_reconnect = Some(wrap(move |event| {
            if let Event::Reconnect { attempt_count, downtime_seconds } = event {
                f(attempt_count, downtime_seconds);
            }
        }));
        self
    }

    pub fn on_callback_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, &str) + Send + Sync + 'static,
    {
        self.callbacks.on_callback_error = Some(wrap(move |event| {
            if let Event::CallbackError { callback, error_class, error_message } = event {
                f(callback, error_class, &error_message);
            }
        }));
        self
    }

    pub fn build(self) -> Result<Config, ConfigurationError> {
        let api_key = self.api_key.ok_or_else(|| ConfigurationError::new("api_key is required"))?;
        if api_key.len() < 10 {
            return Err(ConfigurationError::new("api_key must be at least 10 characters"));
        }
        let lowered = api_key.to_lowercase();
        if PLACEHOLDER_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            return Err(ConfigurationError::new("api_key looks like a placeholder value"));
        }
        if self.retry_max_attempts < 1 {
            return Err(ConfigurationError::new("retry_max_attempts must be >= 1"));
        }
        if self.retry_initial_delay.is_zero() {
            return Err(ConfigurationError::new("retry_initial_delay must be > 0"));
        }
        if self.retry_max_delay < self.retry_initial_delay {
            return Err(ConfigurationError::new("retry_max_delay must be >= retry_initial_delay"));
        }
        if self.retry_backoff_factor < 2.0 {
            return Err(ConfigurationError::new("retry_backoff_factor must be >= 2"));
        }
        if !(0.0..=1.0).contains(&self.rate_limit_threshold) {
            return Err(ConfigurationError::new("rate_limit_threshold must be in [0.0, 1.0]"));
        }

        Ok(Config {
            api_key,
            base_url: self.base_url,
            request_timeout: self.request_timeout,
            retry_max_attempts: self.retry_max_attempts,
            retry_initial_delay: self.retry_initial_delay,
            retry_max_delay: self.retry_max_delay,
            retry_backoff_factor: self.retry_backoff_factor,
            rate_limit_threshold: self.rate_limit_threshold,
            queue_wait_warning_threshold: self.queue_wait_warning_threshold,
            stream_max_reconnect_attempts: self.stream_max_reconnect_attempts,
            stream_initial_reconnect_delay: self.stream_initial_reconnect_delay,
            stream_max_reconnect_delay: self.stream_max_reconnect_delay,
            stream_backoff_multiplier: self.stream_backoff_multiplier,
            stream_latency_warning_threshold: self.stream_latency_warning_threshold,
            callbacks: self.callbacks,
            logger: self.logger,
            log_level: self.log_level,
            default_logging: self.default_logging,
            metrics_backend: self.metrics_backend,
            default_metrics: self.default_metrics,
        })
    }
}

fn wrap<F>(f: F) -> Callback
where
    F: Fn(Event) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_api_key() {
        let err = ConfigBuilder::new().api_key("short").build().unwrap_err();
        assert!(err.message.contains("api_key"));
    }

    #[test]
    fn rejects_placeholder_api_key() {
        let err = ConfigBuilder::new()
            .api_key("changeme_please_1234")
            .build()
            .unwrap_err();
        assert!(err.message.contains("placeholder"));
    }

    #[test]
    fn rejects_backoff_factor_below_two() {
        let err = ConfigBuilder::new()
            .api_key("a_real_api_key_1234")
            .retry_backoff_factor(1.5)
            .build()
            .unwrap_err();
        assert!(err.message.contains("retry_backoff_factor"));
    }

    #[test]
    fn valid_config_builds() {
        let config = ConfigBuilder::new().api_key("a_real_api_key_1234").build().unwrap();
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.base_url, "https://api.sec-api.io");
    }

    #[test]
    fn explicit_builder_call_overrides_env() {
        std::env::set_var("SECAPI_BASE_URL", "https://env.example.com");
        let config = ConfigBuilder::from_env()
            .api_key("a_real_api_key_1234")
            .base_url("https://explicit.example.com")
            .build()
            .unwrap();
        assert_eq!(config.base_url, "https://explicit.example.com");
        std::env::remove_var("SECAPI_BASE_URL");
    }
}
