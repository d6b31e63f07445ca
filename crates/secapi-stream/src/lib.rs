//! Long-lived WebSocket streaming client for the filings feed: a reconnect
//! finite-state machine, frame decoding, and bounded-latency shutdown.
//! This subsystem does not flow through the REST pipeline in
//! `secapi-pipeline`; it is a parallel, push-based delivery path.
//!
//! # Example
//!
//! ```no_run
//! use secapi_core::ConfigBuilder;
//! use secapi_stream::StreamClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigBuilder::new()
//!     .api_key("a_real_api_key_1234")
//!     .on_filing(|filing, latency_ms, _received_at| {
//!         println!("{} arrived {}ms late", filing.accession_no, latency_ms);
//!     })
//!     .build()?;
//!
//! let client = StreamClient::new("wss://stream.secapi.example.com/filings", &config);
//! let handle = client.subscribe();
//! handle.await??;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod decode;
mod policy;
mod state;

pub use client::StreamClient;
pub use config::StreamConfig;
pub use decode::{decode_frame, DecodeError};
pub use policy::ReconnectPolicy;
pub use state::{ConnectionState, StreamState};

pub use secapi_retry::{ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, IntervalFunction};
