//! Instrumentation stage: outermost link in the chain, so the duration it
//! records covers the whole attempt set including every retry.

use std::future::Future;
use std::sync::Arc;

use secapi_core::error::Error;
use secapi_core::request::sanitize_headers;
use secapi_core::{Callbacks, Event, RawResponse, RequestDescriptor, RequestEnv};

pub struct InstrumentationStage {
    callbacks: Arc<Callbacks>,
}

impl InstrumentationStage {
    pub fn new(callbacks: Arc<Callbacks>) -> Self {
        Self { callbacks }
    }

    /// `on_response` and `on_error` are mutually exclusive and exactly one
    /// fires per call; `on_request` always fires first.
    pub async fn call<F, Fut>(
        &self,
        env: &mut RequestEnv,
        descriptor: &RequestDescriptor,
        inner: F,
    ) -> Result<RawResponse, Error>
    where
        F: FnOnce(&mut RequestEnv) -> Fut,
        Fut: Future<Output = Result<RawResponse, Error>>,
    {
        self.callbacks.emit(Event::RequestStart {
            request_id: env.request_id.clone(),
            method: descriptor.method,
            url: descriptor.url.clone(),
            headers_sanitized: sanitize_headers(&descriptor.headers),
        });

        let result = inner(env).await;
        let duration_ms = env.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => {
                self.callbacks.emit(Event::RequestComplete {
                    request_id: env.request_id.clone(),
                    status: response.status,
                    duration_ms,
                    url: descriptor.url.clone(),
                    method: descriptor.method,
                });
            }
            Err(error) => {
                self.callbacks.emit(Event::RequestError {
                    request_id: env.request_id.clone(),
                    error_class: error.class_name(),
                    error_message: error.to_string(),
                    url: descriptor.url.clone(),
                    method: descriptor.method,
                });
            }
        }

        result
    }
}
