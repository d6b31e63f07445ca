//! End-to-end scenarios against a scripted HTTP/1.1 server: each canned
//! response is served on its own connection with `Connection: close`, so a
//! retried request always opens a fresh TCP connection the way `reqwest`
//! does against a real server that doesn't keep the socket alive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secapi_core::error::Error;
use secapi_core::{ConfigBuilder, Method, PerCallOverrides, RequestDescriptor};
use secapi_pipeline::Pipeline;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct Canned {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: &'static str,
}

fn canned(status: u16, headers: &[(&'static str, &str)], body: &'static str) -> Canned {
    Canned { status, headers: headers.iter().map(|(k, v)| (*k, v.to_string())).collect(), body }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Serves `responses` in order, one per accepted connection, then stops.
/// Returns the `http://` base URL to hit.
async fn spawn_scripted_server(responses: Vec<Canned>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for resp in responses {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Read (and discard) the request up through the blank line that
            // ends the header block; we don't need the body for these tests.
            let mut buf = Vec::new();
            let mut byte = [0u8; 1];
            loop {
                socket.read_exact(&mut byte).await.unwrap();
                buf.push(byte[0]);
                if buf.ends_with(b"\r\n\r\n") {
                    break;
                }
            }

            let mut wire = format!(
                "HTTP/1.1 {} {}\r\nConnection: close\r\nContent-Length: {}\r\n",
                resp.status,
                reason_phrase(resp.status),
                resp.body.len()
            );
            for (name, value) in &resp.headers {
                wire.push_str(&format!("{name}: {value}\r\n"));
            }
            wire.push_str("\r\n");
            wire.push_str(resp.body);

            socket.write_all(wire.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
    });

    format!("http://{addr}")
}

fn descriptor(base_url: &str, path: &str) -> RequestDescriptor {
    RequestDescriptor::new(Method::Get, format!("{base_url}{path}"))
}

#[tokio::test]
async fn retries_on_503_then_succeeds() {
    let base_url = spawn_scripted_server(vec![
        canned(503, &[], ""),
        canned(503, &[], ""),
        canned(200, &[], "ok"),
    ])
    .await;

    let retries = Arc::new(Mutex::new(Vec::new()));
    let retries2 = retries.clone();
    let errors = Arc::new(AtomicUsize::new(0));
    let errors2 = errors.clone();

    let config = ConfigBuilder::new()
        .api_key("a_real_api_key_1234")
        .retry_max_attempts(3)
        .retry_initial_delay(Duration::from_millis(10))
        .retry_max_delay(Duration::from_millis(50))
        .on_retry(move |_request_id, attempt, _max_attempts, _error_class, _error_message, _will_retry_in_ms| {
            retries2.lock().unwrap().push(attempt);
        })
        .on_error(move |_request_id, _error_class, _error_message, _url, _method| {
            errors2.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).unwrap();

    let start = std::time::Instant::now();
    let response = pipeline.execute(descriptor(&base_url, "/filings")).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(response.status, 200);
    assert_eq!(*retries.lock().unwrap(), vec![1, 2]);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert!(elapsed >= Duration::from_millis(10), "expected at least the first backoff to elapse");
}

#[tokio::test]
async fn rate_limit_retry_after_then_succeeds() {
    let base_url = spawn_scripted_server(vec![
        canned(429, &[("retry-after", "1")], ""),
        canned(200, &[], "ok"),
    ])
    .await;

    let rate_limits = Arc::new(Mutex::new(Vec::new()));
    let rate_limits2 = rate_limits.clone();
    let retries = Arc::new(AtomicUsize::new(0));
    let retries2 = retries.clone();

    let config = ConfigBuilder::new()
        .api_key("a_real_api_key_1234")
        .retry_max_attempts(3)
        .on_rate_limit(move |_request_id, retry_after, _reset_at, _attempt| {
            rate_limits2.lock().unwrap().push(retry_after);
        })
        .on_retry(move |_request_id, _attempt, _max_attempts, _error_class, _error_message, _will_retry_in_ms| {
            retries2.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).unwrap();

    let start = std::time::Instant::now();
    let response = pipeline.execute(descriptor(&base_url, "/filings")).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(response.status, 200);
    assert_eq!(*rate_limits.lock().unwrap(), vec![Some(1)]);
    assert_eq!(retries.load(Ordering::SeqCst), 1);
    assert!(elapsed >= Duration::from_millis(900), "scheduler should have waited ~1s: {elapsed:?}");
}

#[tokio::test]
async fn exhausts_retries_on_repeated_503() {
    let base_url = spawn_scripted_server(vec![
        canned(503, &[], ""),
        canned(503, &[], ""),
        canned(503, &[], ""),
    ])
    .await;

    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors2 = errors.clone();
    let responses = Arc::new(AtomicUsize::new(0));
    let responses2 = responses.clone();

    let config = ConfigBuilder::new()
        .api_key("a_real_api_key_1234")
        .retry_max_attempts(3)
        .retry_initial_delay(Duration::from_millis(5))
        .retry_max_delay(Duration::from_millis(20))
        .on_error(move |_request_id, _error_class, error_message, _url, _method| {
            errors2.lock().unwrap().push(error_message.to_string());
        })
        .on_response(move |_request_id, _status, _duration_ms, _url, _method| {
            responses2.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).unwrap();

    let result = pipeline.execute(descriptor(&base_url, "/filings")).await;

    assert!(matches!(
        result,
        Err(Error::Transient(secapi_core::TransientError::Server(_)))
    ));
    assert_eq!(responses.load(Ordering::SeqCst), 0);
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("503"));
    assert!(errors[0].starts_with('['), "message should be prefixed with [request_id]: {}", errors[0]);
}

#[tokio::test]
async fn queues_while_quota_exhausted_then_drains() {
    let base_url = spawn_scripted_server(vec![canned(200, &[("x-ratelimit-remaining", "99")], "ok")]).await;

    let queues = Arc::new(AtomicUsize::new(0));
    let queues2 = queues.clone();
    let dequeues = Arc::new(AtomicUsize::new(0));
    let dequeues2 = dequeues.clone();

    let config = ConfigBuilder::new()
        .api_key("a_real_api_key_1234")
        .on_queue(move |_request_id, _queue_size, _wait_ms, _reset_at| {
            queues2.fetch_add(1, Ordering::SeqCst);
        })
        .on_dequeue(move |_request_id, _queue_size_after, _waited_ms| {
            dequeues2.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).unwrap();

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    pipeline.tracker().update(Some(100), Some(0), Some(now + 1));

    let start = std::time::Instant::now();
    let response = pipeline.execute(descriptor(&base_url, "/filings")).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(response.status, 200);
    assert!(elapsed >= Duration::from_millis(50), "request should have waited out the queue: {elapsed:?}");
    assert_eq!(queues.load(Ordering::SeqCst), 1);
    assert_eq!(dequeues.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.tracker().queued_count(), 0);
    assert_eq!(pipeline.tracker().current_state().remaining, Some(99));
}

#[tokio::test]
async fn per_call_max_attempts_override_cuts_off_client_default() {
    let base_url = spawn_scripted_server(vec![canned(503, &[], ""), canned(503, &[], "")]).await;

    let retries = Arc::new(AtomicUsize::new(0));
    let retries2 = retries.clone();

    let config = ConfigBuilder::new()
        .api_key("a_real_api_key_1234")
        .retry_max_attempts(5)
        .retry_initial_delay(Duration::from_millis(5))
        .retry_max_delay(Duration::from_millis(20))
        .on_retry(move |_request_id, _attempt, _max_attempts, _error_class, _error_message, _will_retry_in_ms| {
            retries2.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).unwrap();

    let mut descriptor = descriptor(&base_url, "/filings");
    descriptor.per_call_overrides = Some(PerCallOverrides { retry_max_attempts: Some(1), request_timeout: None });

    let result = pipeline.execute(descriptor).await;

    assert!(matches!(result, Err(Error::Transient(secapi_core::TransientError::Server(_)))));
    assert_eq!(retries.load(Ordering::SeqCst), 0, "max_attempts=1 should leave no room to retry");
}

#[tokio::test]
async fn per_call_timeout_override_times_out_before_the_slow_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let config = ConfigBuilder::new()
        .api_key("a_real_api_key_1234")
        .retry_max_attempts(1)
        .request_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).unwrap();

    let mut descriptor = descriptor(&format!("http://{addr}"), "/filings");
    descriptor.per_call_overrides =
        Some(PerCallOverrides { retry_max_attempts: None, request_timeout: Some(Duration::from_millis(50)) });

    let result = pipeline.execute(descriptor).await;

    assert!(
        matches!(
            result,
            Err(Error::Transient(secapi_core::TransientError::Network(secapi_core::NetworkError {
                kind: secapi_core::NetworkErrorKind::Timeout,
                ..
            })))
        ),
        "expected a timeout classified error, got {result:?}"
    );
}

#[tokio::test]
async fn credential_never_leaks_on_authentication_error() {
    let base_url = spawn_scripted_server(vec![canned(401, &[], "")]).await;

    let seen_headers = Arc::new(Mutex::new(std::collections::BTreeMap::new()));
    let seen_headers2 = seen_headers.clone();

    let config = ConfigBuilder::new()
        .api_key("a_real_api_key_1234")
        .on_request(move |_request_id, _method, _url, headers_sanitized| {
            *seen_headers2.lock().unwrap() = headers_sanitized.clone();
        })
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).unwrap();

    let result = pipeline.execute(descriptor(&base_url, "/filings")).await;

    match result {
        Err(Error::Permanent(secapi_core::PermanentError::Authentication(err))) => {
            assert!(!err.message.contains("a_real_api_key_1234"));
            assert!(!err.message.to_lowercase().contains("authorization"));
            assert!(!err.message.to_lowercase().contains("bearer"));
        }
        other => panic!("expected an authentication error, got {other:?}"),
    }

    let headers = seen_headers.lock().unwrap();
    assert!(!headers.keys().any(|k| k.eq_ignore_ascii_case("authorization")));
}
