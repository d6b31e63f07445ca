//! Pipeline driver, HTTP transport, error classifier, and default emitters
//! for the secapi client runtime.
//!
//! Stage order is fixed: instrumentation wraps retry, retry wraps the
//! rate limiter, the rate limiter wraps the transport, and the transport
//! hands off to the classifier before anything sees a typed [`Error`].

pub mod classifier;
pub mod driver;
pub mod emitters;
pub mod instrumentation;
pub mod transport;

pub use classifier::TransportFailureKind;
pub use driver::Pipeline;
pub use emitters::wire_defaults;
pub use transport::HttpTransport;

pub use secapi_core::error::Error;
