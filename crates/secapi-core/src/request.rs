//! The pipeline's input descriptor and the mutable per-call carrier threaded
//! through the stage chain.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::cancellation::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Methods the retry stage is willing to retry: all read-safe verbs plus
    /// POST, since every endpoint this client targets is idempotent.
    pub fn is_retry_eligible(&self) -> bool {
        true
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operation overrides an endpoint adapter may supply for one call.
/// `retry_max_attempts` replaces the client's retry bound for this call only
/// (`Pipeline::run_retry`); `request_timeout` replaces the per-attempt
/// transport timeout (`HttpTransport::send`). Both are read by the pipeline
/// on every call, not just when set — `None` falls back to the client's
/// configured default.
#[derive(Debug, Clone, Default)]
pub struct PerCallOverrides {
    pub retry_max_attempts: Option<usize>,
    pub request_timeout: Option<Duration>,
}

/// Input to the pipeline. `optional_request_id` lets a caller pre-assign a
/// trace id that survives every retry, callback, and the resulting error.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub optional_request_id: Option<String>,
    pub per_call_overrides: Option<PerCallOverrides>,
    /// Races every suspension point (throttle sleep, queue wait, retry
    /// backoff) against this token; firing it mid-sleep ends the call with
    /// `Error::Cancelled` instead of a `TransientError` (spec §5).
    pub cancellation: Option<CancellationToken>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            optional_request_id: None,
            per_call_overrides: None,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Mutable, request-scoped context passed by reference down the stage
/// chain — not a mutable environment hash, an explicit struct with named
/// fields. Not visible outside the pipeline.
#[derive(Debug)]
pub struct RequestEnv {
    pub request_id: String,
    pub started_at: Instant,
    /// 1-indexed attempt currently in flight.
    pub attempt: usize,
    pub last_rate_limit_headers: BTreeMap<String, String>,
    pub cancellation: Option<CancellationToken>,
}

impl RequestEnv {
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            started_at: Instant::now(),
            attempt: 1,
            last_rate_limit_headers: BTreeMap::new(),
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Strips any header whose name matches `authorization`, case-insensitively,
/// before it is handed to `on_request` or logged.
pub fn sanitize_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(k, _)| !k.eq_ignore_ascii_case("authorization"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
