//! Error-classification stage: maps a raw HTTP outcome to the sealed
//! taxonomy. Sits just above the transport so the retry stage above it can
//! match on `is_transient()`/`is_permanent()` without ever seeing a status
//! code.

use secapi_core::error::{
    prefix_request_id, redact, AuthenticationError, Error, NetworkError, NetworkErrorKind,
    NotFoundError, PermanentError, RateLimitError, ServerError, TransientError, ValidationError,
};
use secapi_core::RawResponse;

/// Transport-level failure observed before any response was received, e.g.
/// a connect timeout. The transport module surfaces this; the classifier
/// turns it into a `NetworkError` the same way it would a 5xx.
#[derive(Debug, Clone, Copy)]
pub enum TransportFailureKind {
    Timeout,
    ConnectionRefused,
    Tls,
    Other,
}

impl From<TransportFailureKind> for NetworkErrorKind {
    fn from(kind: TransportFailureKind) -> Self {
        match kind {
            TransportFailureKind::Timeout => NetworkErrorKind::Timeout,
            TransportFailureKind::ConnectionRefused => NetworkErrorKind::ConnectionRefused,
            TransportFailureKind::Tls => NetworkErrorKind::Tls,
            TransportFailureKind::Other => NetworkErrorKind::Other,
        }
    }
}

/// Classifies a successful transport round-trip. HTTP 2xx/3xx pass through
/// unchanged; everything else becomes a typed `Error`.
pub fn classify_response(
    response: RawResponse,
    request_id: &str,
    api_key: &str,
) -> Result<RawResponse, Error> {
    let status = response.status;
    if (200..400).contains(&status) {
        return Ok(response);
    }

    let retry_after = response.header("retry-after").and_then(parse_retry_after);
    let reset_at = response.header("x-ratelimit-reset").and_then(parse_unix_seconds);

    let detail = match (retry_after, reset_at) {
        (Some(ra), _) => format!(" (retry_after={ra})"),
        (None, Some(r)) => format!(" (reset_at={r})"),
        (None, None) => String::new(),
    };
    let message = redact(
        &prefix_request_id(request_id, format!("HTTP {status}{detail}")),
        api_key,
    );
    let headers = response.headers.clone();

    let error = match status {
        400 | 422 => Error::Permanent(PermanentError::Validation(ValidationError {
            request_id: request_id.to_string(),
            message,
            status,
            headers,
        })),
        401 | 403 => Error::Permanent(PermanentError::Authentication(AuthenticationError {
            request_id: request_id.to_string(),
            message,
            status,
            headers,
        })),
        404 => Error::Permanent(PermanentError::NotFound(NotFoundError {
            request_id: request_id.to_string(),
            message,
            headers,
        })),
        429 => Error::Transient(TransientError::RateLimit(RateLimitError {
            request_id: request_id.to_string(),
            message,
            status,
            retry_after,
            reset_at,
            headers,
        })),
        500..=599 => Error::Transient(TransientError::Server(ServerError {
            request_id: request_id.to_string(),
            message,
            status,
            headers,
        })),
        _ => Error::Transient(TransientError::Server(ServerError {
            request_id: request_id.to_string(),
            message,
            status,
            headers,
        })),
    };
    Err(error)
}

/// Classifies a failure the transport surfaced before any response arrived.
pub fn classify_transport_failure(
    kind: TransportFailureKind,
    request_id: &str,
    api_key: &str,
    detail: &str,
) -> Error {
    let message = redact(&prefix_request_id(request_id, detail), api_key);
    Error::Transient(TransientError::Network(NetworkError {
        request_id: request_id.to_string(),
        message,
        kind: kind.into(),
        headers: Default::default(),
    }))
}

/// `Retry-After`: integer seconds (possibly negative, preserved verbatim)
/// or an HTTP-date. Anything else is unparseable and ignored.
fn parse_retry_after(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(secs) = trimmed.parse::<i64>() {
        return Some(secs);
    }
    httpdate::parse_http_date(trimmed).ok().and_then(|date| {
        let now = std::time::SystemTime::now();
        date.duration_since(now)
            .map(|d| d.as_secs() as i64)
            .or_else(|_| now.duration_since(date).map(|d| -(d.as_secs() as i64)))
            .ok()
    })
}

fn parse_unix_seconds(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}
