//! Server-quota-aware rate limiting for the secapi request pipeline.
//!
//! Unlike a token-bucket limiter enforcing a budget the client owns, this
//! stage tracks a budget the *server* reports via `X-RateLimit-*` response
//! headers: it throttles proactively as the quota runs low and queues
//! requests once it is exhausted, released when `reset_at` passes.

pub mod config;
pub mod guard;
pub mod headers;
pub mod stage;

pub use config::{RateLimiterConfig, DEFAULT_QUEUE_WAIT};
pub use stage::RateLimiterStage;
