//! Rate-limiter stage configuration, derived from the client's [`Config`].

use std::time::Duration;

use secapi_core::Config;

/// Default wait applied when queueing and `reset_at` is unknown (spec
/// documents 60s).
pub const DEFAULT_QUEUE_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// `0.0` disables proactive throttling; `1.0` throttles whenever any
    /// quota has been consumed.
    pub threshold: f64,
    pub queue_wait_warning_threshold: Duration,
}

impl RateLimiterConfig {
    pub fn from_client_config(config: &Config) -> Self {
        Self {
            threshold: config.rate_limit_threshold,
            queue_wait_warning_threshold: config.queue_wait_warning_threshold,
        }
    }
}
