//! Shared domain types for the secapi client runtime: config, the sealed
//! error taxonomy, the lifecycle event system, the rate-limit tracker, and
//! the request descriptor/env carried through the pipeline.
//!
//! This crate has no opinion on HTTP or WebSocket transport — it is the
//! leaf of the dependency graph every other secapi crate builds on.

pub mod cancellation;
pub mod config;
pub mod error;
pub mod events;
pub mod filing;
pub mod ids;
pub mod rate_limit;
pub mod request;
pub mod response;

pub use cancellation::CancellationToken;
pub use config::{Config, ConfigBuilder};
pub use error::{
    AuthenticationError, CancelledError, ConfigurationError, Error, NetworkError, NetworkErrorKind,
    NotFoundError, PermanentError, RateLimitError, ServerError, TransientError, ValidationError,
};
pub use events::{Callback, Callbacks, Event, LogLevel, Logger, MetricsBackend};
pub use filing::StreamFiling;
pub use rate_limit::{RateLimitState, RateLimitTracker};
pub use request::{Method, PerCallOverrides, RequestDescriptor, RequestEnv};
pub use response::RawResponse;
