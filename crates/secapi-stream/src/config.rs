//! Streaming reconnect configuration, derived from the client's `Config`.

use std::time::Duration;

use secapi_core::Config;
use secapi_retry::ExponentialBackoff;

use crate::policy::ReconnectPolicy;

/// Reconnect policy and bounds for the streaming client, derived once from
/// the shared client `Config` rather than built independently — the
/// `stream_*` fields are the single source of truth (spec.md §3).
#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub(crate) policy: ReconnectPolicy,
    pub(crate) max_attempts: Option<u32>,
    pub(crate) latency_warning_threshold: Duration,
}

impl StreamConfig {
    pub fn from_client_config(config: &Config) -> Self {
        Self {
            policy: ReconnectPolicy::Exponential(
                ExponentialBackoff::new(config.stream_initial_reconnect_delay)
                    .multiplier(config.stream_backoff_multiplier)
                    .max_interval(config.stream_max_reconnect_delay),
            ),
            max_attempts: Some(config.stream_max_reconnect_attempts as u32),
            latency_warning_threshold: config.stream_latency_warning_threshold,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn latency_warning_threshold(&self) -> Duration {
        self.latency_warning_threshold
    }
}
