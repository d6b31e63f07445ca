//! Retry schedule configuration, derived from the client's [`Config`] with
//! an optional per-call override for `max_attempts`.

use std::time::Duration;

use secapi_core::Config;

use crate::backoff::ExponentialBackoff;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryConfig {
    pub fn from_client_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            initial_delay: config.retry_initial_delay,
            max_delay: config.retry_max_delay,
            backoff_factor: config.retry_backoff_factor,
        }
    }

    /// Per-call override of `max_attempts`; every other field is shared
    /// across all requests of a client.
    pub fn with_max_attempts(&self, max_attempts: usize) -> Self {
        Self { max_attempts, ..self.clone() }
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.initial_delay)
            .multiplier(self.backoff_factor)
            .max_interval(self.max_delay)
    }
}
