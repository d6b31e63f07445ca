//! Bounded retry with exponential backoff for the secapi request pipeline.
//!
//! `TransientError` is retried subject to `retry_max_attempts`; a
//! `RateLimitError`'s schedule is overridden by the server's `Retry-After`/
//! `X-RateLimit-Reset` hints (see [`hints::override_wait`]).
//! `PermanentError` never retries.

pub mod backoff;
pub mod config;
pub mod hints;
pub mod stage;

pub use backoff::{ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction};
pub use config::RetryConfig;
pub use stage::RetryStage;
