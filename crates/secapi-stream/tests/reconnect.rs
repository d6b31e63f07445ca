//! End-to-end reconnect scenario against a local WebSocket server: a
//! connection that ends without a close frame (the wire-level shape of an
//! abnormal 1006 closure) must trigger exactly one reconnect, and filings
//! delivered on both the original and the reconnected socket must both
//! reach `on_filing`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use secapi_core::ConfigBuilder;
use secapi_stream::{ConnectionState, StreamClient};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

fn filing_frame(accession_no: &str) -> String {
    format!(
        r#"[{{"accessionNo":"{accession_no}","formType":"10-K","filedAt":0,"cik":"1","companyName":"Acme"}}]"#
    )
}

#[tokio::test]
async fn reconnects_once_after_abnormal_close_and_keeps_delivering_filings() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // First connection: one filing, then the socket is dropped without a
        // close frame (the wire shape of an abnormal 1006 disconnect).
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(filing_frame("0001"))).await.unwrap();
        drop(ws);

        // Second connection (the reconnect): two more filings, then a clean
        // terminal close.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text(filing_frame("0002"))).await.unwrap();
        ws.send(Message::Text(filing_frame("0003"))).await.unwrap();
        let _ = ws.close(None).await;
    });

    let filings_seen = Arc::new(AtomicUsize::new(0));
    let filings_seen2 = filings_seen.clone();
    let reconnects = Arc::new(Mutex::new(Vec::new()));
    let reconnects2 = reconnects.clone();

    let config = ConfigBuilder::new()
        .api_key("a_real_api_key_1234")
        .stream_initial_reconnect_delay(Duration::from_millis(5))
        .stream_max_reconnect_attempts(5)
        .on_filing(move |_filing, _latency_ms, _received_at| {
            filings_seen2.fetch_add(1, Ordering::SeqCst);
        })
        .on_reconnect(move |attempt, downtime| {
            reconnects2.lock().unwrap().push((attempt, downtime));
        })
        .build()
        .unwrap();

    let url = format!("ws://{addr}/filings");
    let client = StreamClient::new(&url, &config);
    let state = client.state().clone();

    let handle = client.subscribe();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    assert!(result.is_ok(), "expected a terminal close to end the stream cleanly: {result:?}");
    assert_eq!(filings_seen.load(Ordering::SeqCst), 3);
    assert_eq!(state.state(), ConnectionState::Closed);

    let reconnect_events = reconnects.lock().unwrap();
    assert_eq!(reconnect_events.len(), 1);
    let (attempt, downtime) = reconnect_events[0];
    assert_eq!(attempt, 1);
    assert!(downtime >= 0.0);
}
