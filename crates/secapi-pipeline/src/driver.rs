//! Pipeline Driver: assembles the fixed stage chain and drives one request
//! through it. Plain function composition — each stage's `inner` parameter
//! is the next stage's `call`, nothing dispatches by reflection.

use std::sync::Arc;

use secapi_core::error::{ConfigurationError, Error};
use secapi_core::{Callbacks, Config, RateLimitTracker, RawResponse, RequestDescriptor, RequestEnv};
use secapi_ratelimiter::{RateLimiterConfig, RateLimiterStage};
use secapi_retry::{RetryConfig, RetryStage};

use crate::transport::HttpTransport;

pub struct Pipeline {
    config: Config,
    tracker: Arc<RateLimitTracker>,
    instrumentation: crate::instrumentation::InstrumentationStage,
    retry: RetryStage,
    rate_limiter: RateLimiterStage,
    transport: HttpTransport,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, ConfigurationError> {
        let callbacks: Arc<Callbacks> = Arc::new(crate::emitters::wire_defaults(&config));
        let tracker = Arc::new(RateLimitTracker::new());

        let retry_config = RetryConfig::from_client_config(&config);
        let rate_limiter_config = RateLimiterConfig::from_client_config(&config);
        let transport = HttpTransport::new(config.api_key.clone(), config.request_timeout)
            .map_err(|e| ConfigurationError::new(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            instrumentation: crate::instrumentation::InstrumentationStage::new(callbacks.clone()),
            retry: RetryStage::new(retry_config, callbacks.clone()),
            rate_limiter: RateLimiterStage::new(rate_limiter_config, tracker.clone(), callbacks),
            transport,
            tracker,
            config,
        })
    }

    /// §4.1: fresh `RequestEnv` per call; a pre-assigned `request_id` on the
    /// descriptor is preserved, otherwise a new one is minted.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<RawResponse, Error> {
        let request_id = descriptor
            .optional_request_id
            .clone()
            .unwrap_or_else(secapi_core::ids::new_request_id);
        let mut env = RequestEnv::new(request_id).with_cancellation(descriptor.cancellation.clone());

        self.instrumentation
            .call(&mut env, &descriptor, |env| self.run_retry(env, &descriptor))
            .await
    }

    async fn run_retry(&self, env: &mut RequestEnv, descriptor: &RequestDescriptor) -> Result<RawResponse, Error> {
        let max_attempts_override =
            descriptor.per_call_overrides.as_ref().and_then(|overrides| overrides.retry_max_attempts);
        self.retry
            .call_with_max_attempts(env, max_attempts_override, |env| self.run_rate_limited(env, descriptor))
            .await
    }

    async fn run_rate_limited(
        &self,
        env: &mut RequestEnv,
        descriptor: &RequestDescriptor,
    ) -> Result<RawResponse, Error> {
        self.rate_limiter
            .call(env, |env| self.transport.send(descriptor, &env.request_id))
            .await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<RateLimitTracker> {
        &self.tracker
    }
}
