//! HTTP transport: the only place in the workspace that knows about
//! `reqwest`. Converts a [`RequestDescriptor`] into a wire request and a
//! `reqwest::Response` back into the transport-agnostic [`RawResponse`].
//! Per-attempt timeouts cover connect + read + write only — retry,
//! throttle, and queue waits happen in stages above this one.

use std::time::Duration;

use secapi_core::error::Error;
use secapi_core::{Method, RequestDescriptor};

use crate::classifier::{classify_transport_failure, TransportFailureKind};

pub struct HttpTransport {
    client: reqwest::Client,
    api_key: String,
}

impl HttpTransport {
    pub fn new(api_key: String, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, api_key })
    }

    pub async fn send(
        &self,
        descriptor: &RequestDescriptor,
        request_id: &str,
    ) -> Result<secapi_core::RawResponse, Error> {
        let method = to_reqwest_method(descriptor.method);
        let mut builder = self
            .client
            .request(method, &descriptor.url)
            .bearer_auth(&self.api_key);

        if let Some(timeout) = descriptor.per_call_overrides.as_ref().and_then(|o| o.request_timeout) {
            builder = builder.timeout(timeout);
        }

        for (name, value) in &descriptor.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &descriptor.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|err| self.classify_send_error(err, request_id))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (name.as_str().to_ascii_lowercase(), value.to_str().unwrap_or_default().to_string())
            })
            .collect();
        let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();

        crate::classifier::classify_response(
            secapi_core::RawResponse { status, headers, body },
            request_id,
            &self.api_key,
        )
    }

    fn classify_send_error(&self, err: reqwest::Error, request_id: &str) -> Error {
        let kind = if err.is_timeout() {
            TransportFailureKind::Timeout
        } else if err.is_connect() {
            TransportFailureKind::ConnectionRefused
        } else if err.to_string().to_lowercase().contains("tls") || err.to_string().to_lowercase().contains("certificate") {
            TransportFailureKind::Tls
        } else {
            TransportFailureKind::Other
        };
        classify_transport_failure(kind, request_id, &self.api_key, &err.to_string())
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}
