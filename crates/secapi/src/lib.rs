//! Resilient client runtime for a financial-filings HTTP/WebSocket API.
//!
//! This crate is the facade over the per-concern crates that do the actual
//! work: [`secapi_core`] (config, error taxonomy, event system),
//! [`secapi_pipeline`] (the fixed request pipeline — instrumentation, retry,
//! rate-limiting, error classification, transport), and, with the `stream`
//! feature, [`secapi_stream`] (the WebSocket reconnect client).
//!
//! Endpoint adapters — the query builder, response decoders, XBRL parsing,
//! full-text search — are out of scope here; this crate exposes only the
//! contract they build on: [`Client::execute`] for one REST call through the
//! pipeline, and [`Client::connect_stream`] for the long-lived filings feed.
//!
//! # Example
//!
//! ```no_run
//! use secapi::{Client, Method, RequestDescriptor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::builder()
//!     .api_key("a_real_api_key_1234")
//!     .build()?;
//!
//! let descriptor = RequestDescriptor::new(Method::Get, "https://api.secapi.example.com/filings/0001");
//! let response = client.execute(descriptor).await?;
//! println!("status {}", response.status);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use secapi_core::error::ConfigurationError;
use secapi_pipeline::Pipeline;

pub use secapi_core::cancellation::CancellationToken;
pub use secapi_core::config::{Config, ConfigBuilder};
pub use secapi_core::error::{
    AuthenticationError, CancelledError, Error, NetworkError, NetworkErrorKind, NotFoundError,
    PermanentError, RateLimitError, ServerError, TransientError, ValidationError,
};
pub use secapi_core::events::{Callback, Callbacks, Event, LogLevel, Logger, MetricsBackend};
pub use secapi_core::filing::StreamFiling;
pub use secapi_core::rate_limit::RateLimitState;
pub use secapi_core::{Method, PerCallOverrides, RequestDescriptor};
pub use secapi_core::response::RawResponse;
pub use secapi_core::RequestEnv;

#[cfg(feature = "stream")]
pub use secapi_stream::{ConnectionState, StreamClient, StreamConfig};

/// Entry point: one REST pipeline plus, with the `stream` feature, a
/// factory for WebSocket streaming clients. Cheap to clone — everything it
/// holds is already behind an `Arc`.
#[derive(Clone)]
pub struct Client {
    config: Config,
    pipeline: Arc<Pipeline>,
}

impl Client {
    /// Starting point for building a [`Client`]; equivalent to
    /// `ConfigBuilder::new()` but keeps callers from needing a second
    /// import just to construct one.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Builds a client from an already-constructed [`Config`]. Fails only
    /// on transport construction errors (e.g. an unparsable TLS setup);
    /// `Config` itself is validated by [`ConfigBuilder::build`].
    pub fn new(config: Config) -> Result<Self, ConfigurationError> {
        let pipeline = Pipeline::new(config.clone())?;
        Ok(Self { config, pipeline: Arc::new(pipeline) })
    }

    /// Runs one request through the full pipeline: instrumentation, retry,
    /// rate-limiting, error classification, transport.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<RawResponse, Error> {
        self.pipeline.execute(descriptor).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current rate-limit snapshot. Fields are `None` until a response
    /// carrying the corresponding header has been seen.
    pub fn rate_limit_state(&self) -> RateLimitState {
        self.pipeline.tracker().current_state()
    }

    /// Builds a streaming client for `feed_url`, a `wss://` endpoint without
    /// the API key query parameter (appended internally, spec §6). Call
    /// `.subscribe()` on the result to spawn the connection loop.
    #[cfg(feature = "stream")]
    pub fn connect_stream(&self, feed_url: &str) -> StreamClient {
        StreamClient::new(feed_url, &self.config)
    }
}
