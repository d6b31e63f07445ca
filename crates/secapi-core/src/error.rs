//! Sealed error taxonomy.
//!
//! Every leaf is either [`TransientError`] (retry-eligible) or
//! [`PermanentError`] (never retried). The retry stage inspects only that
//! polarity, never a concrete leaf — see [`Error::is_transient`].

use std::collections::BTreeMap;
use std::fmt;

/// Kind of network-level failure, used only for classification and metrics
/// tagging; never rendered verbatim into a message (the message is built by
/// the classifier with the redacted, human-readable text).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    ConnectionRefused,
    Tls,
    Other,
}

macro_rules! leaf_error {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, thiserror::Error)]
        #[error("{message}")]
        pub struct $name {
            pub request_id: String,
            pub message: String,
            /// Raw response headers, so the rate-limiter stage can read
            /// `X-RateLimit-*` off an error response without needing the
            /// original `RawResponse` (which the classifier already
            /// consumed). Empty when there was no response (e.g. a
            /// connect-timeout `NetworkError`).
            pub headers: BTreeMap<String, String>,
            $(pub $field: $ty,)*
        }
    };
}

leaf_error!(RateLimitError {
    status: u16,
    retry_after: Option<i64>,
    reset_at: Option<i64>,
});

leaf_error!(ServerError {
    status: u16,
});

leaf_error!(NetworkError {
    kind: NetworkErrorKind,
});

leaf_error!(ValidationError {
    status: u16,
});

leaf_error!(AuthenticationError {
    status: u16,
});

leaf_error!(NotFoundError {});

/// Setup-time failure. Never raised mid-request.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ConfigurationError {
    pub message: String,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A suspension point (throttle sleep, queue wait, retry backoff) lost the
/// race against a caller-supplied `CancellationToken`. Distinct from
/// `TransientError`: callers must not retry a cancellation the way they
/// would a transient failure (spec §5).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CancelledError {
    pub request_id: String,
    pub message: String,
}

/// Retry-eligible failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransientError {
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl TransientError {
    pub fn request_id(&self) -> &str {
        match self {
            TransientError::RateLimit(e) => &e.request_id,
            TransientError::Server(e) => &e.request_id,
            TransientError::Network(e) => &e.request_id,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            TransientError::RateLimit(_) => "RateLimitError",
            TransientError::Server(_) => "ServerError",
            TransientError::Network(_) => "NetworkError",
        }
    }

    pub fn as_rate_limit(&self) -> Option<&RateLimitError> {
        match self {
            TransientError::RateLimit(e) => Some(e),
            _ => None,
        }
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        match self {
            TransientError::RateLimit(e) => &e.headers,
            TransientError::Server(e) => &e.headers,
            TransientError::Network(e) => &e.headers,
        }
    }
}

/// Never retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PermanentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

impl PermanentError {
    pub fn request_id(&self) -> &str {
        match self {
            PermanentError::Validation(e) => &e.request_id,
            PermanentError::Authentication(e) => &e.request_id,
            PermanentError::NotFound(e) => &e.request_id,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            PermanentError::Validation(_) => "ValidationError",
            PermanentError::Authentication(_) => "AuthenticationError",
            PermanentError::NotFound(_) => "NotFoundError",
        }
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        match self {
            PermanentError::Validation(e) => &e.headers,
            PermanentError::Authentication(e) => &e.headers,
            PermanentError::NotFound(e) => &e.headers,
        }
    }
}

/// Root error type surfaced to callers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Transient(#[from] TransientError),
    #[error(transparent)]
    Permanent(#[from] PermanentError),
    #[error(transparent)]
    Cancelled(#[from] CancelledError),
}

impl Error {
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Error::Permanent(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// `None` only for `ConfigurationError`, which is never raised mid-request.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Error::Configuration(_) => None,
            Error::Transient(e) => Some(e.request_id()),
            Error::Permanent(e) => Some(e.request_id()),
            Error::Cancelled(e) => Some(&e.request_id),
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::Transient(e) => e.class_name(),
            Error::Permanent(e) => e.class_name(),
            Error::Cancelled(_) => "CancelledError",
        }
    }

    /// Raw response headers carried by the leaf, so a stage sitting above
    /// the classifier can still read `X-RateLimit-*` off an error response.
    /// `None` for `ConfigurationError` and `CancelledError`, neither of
    /// which carries a response.
    pub fn headers(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Error::Configuration(_) => None,
            Error::Transient(e) => Some(e.headers()),
            Error::Permanent(e) => Some(e.headers()),
            Error::Cancelled(_) => None,
        }
    }
}

/// Prefixes a message with the request id exactly once, the format every
/// surfaced error uses: `"[<id>] <message>"`.
pub fn prefix_request_id(request_id: &str, message: impl fmt::Display) -> String {
    format!("[{request_id}] {message}")
}

/// Scrubs a credential value and any `Authorization`/`Bearer` text from a
/// message before it is ever stored on an error or event. Called by the
/// classifier on every constructed message.
pub fn redact(input: &str, secret: &str) -> String {
    let mut out = input.to_string();
    if !secret.is_empty() {
        out = out.replace(secret, "[REDACTED]");
    }
    out = redact_marker(&out, "bearer ");
    out = redact_marker(&out, "authorization:");
    out
}

fn redact_marker(input: &str, marker: &str) -> String {
    let lower = input.to_lowercase();
    let mut result = String::with_capacity(input.len());
    let mut rest = input;
    let mut rest_lower = lower.as_str();
    while let Some(idx) = rest_lower.find(marker) {
        result.push_str(&rest[..idx]);
        result.push_str("[REDACTED]");
        let after = idx + marker.len();
        let skip = rest[after..]
            .find(char::is_whitespace)
            .unwrap_or(rest[after..].len());
        rest = &rest[after + skip..];
        rest_lower = &rest_lower[after + skip..];
    }
    result.push_str(rest);
    result
}
