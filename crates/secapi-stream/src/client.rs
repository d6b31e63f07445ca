//! Long-lived WebSocket streaming client: reconnect FSM, frame decoding,
//! and bounded-latency shutdown via the `running` flag. Runs on its own
//! task rather than nested callbacks (spec.md §9's redesign note).

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use secapi_core::error::{AuthenticationError, Error, NetworkError, NetworkErrorKind, PermanentError, TransientError};
use secapi_core::{Callbacks, Config, Event};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::config::StreamConfig;
use crate::decode::decode_frame;
use crate::state::{ConnectionState, StreamState};

/// A WebSocket client subscribed to the filings feed. Construct once per
/// subscription; `subscribe()` spawns the connection loop and returns a
/// handle whose result reflects why the stream stopped.
pub struct StreamClient {
    url: String,
    config: StreamConfig,
    callbacks: Arc<Callbacks>,
    state: StreamState,
}

impl StreamClient {
    /// `feed_url` is the `wss://` endpoint without the API key query
    /// parameter; it is appended here (spec.md §5: `wss://<stream-host>
    /// ?apiKey=<api_key>`).
    pub fn new(feed_url: &str, client_config: &Config) -> Self {
        Self {
            url: build_url(feed_url, &client_config.api_key),
            config: StreamConfig::from_client_config(client_config),
            callbacks: Arc::new(client_config.callbacks.clone()),
            state: StreamState::new(),
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Requests shutdown. In-flight elements later in the current frame
    /// are not dispatched; the task winds down at the next `running` check.
    pub fn close(&self) {
        self.state.mark_closed();
    }

    /// Spawns the connection loop. The returned handle resolves to `Ok(())`
    /// on an explicit `close()` or a terminal-OK close code, and to `Err`
    /// for an authentication failure or reconnect-attempts exhaustion.
    pub fn subscribe(self) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.run())
    }

    async fn run(self) -> Result<(), Error> {
        loop {
            self.state.set_state(ConnectionState::Connecting);

            let mut socket = match connect_async(&self.url).await {
                Ok((socket, _response)) => socket,
                Err(err) => match self.prepare_reconnect(network_error(&err.to_string())) {
                    Ok(delay) => {
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    Err(err) => {
                        self.state.mark_closed();
                        return Err(err);
                    }
                },
            };

            self.state.mark_connected();

            let disconnect_reason = loop {
                if !self.state.is_running() {
                    return Ok(());
                }
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => {
                        self.dispatch_frame(&text);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        match self.classify_close(code) {
                            CloseOutcome::TerminalOk => {
                                self.state.mark_closed();
                                return Ok(());
                            }
                            CloseOutcome::TerminalError(err) => {
                                self.state.mark_closed();
                                return Err(err);
                            }
                            CloseOutcome::Reconnect(err) => break err,
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break network_error(&err.to_string()),
                    None => break network_error("connection closed without a close frame"),
                }
            };

            if !self.state.is_running() {
                return Ok(());
            }
            match self.prepare_reconnect(disconnect_reason) {
                Ok(delay) => tokio::time::sleep(delay).await,
                Err(err) => {
                    self.state.mark_closed();
                    return Err(err);
                }
            }
        }
    }

    fn dispatch_frame(&self, frame: &str) {
        for result in decode_frame(frame) {
            if !self.state.is_running() {
                return;
            }
            match result {
                Ok(filing) => self.dispatch_filing(filing),
                Err(decode_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %decode_err, "secapi.stream.decode_error");
                    #[cfg(not(feature = "tracing"))]
                    let _ = decode_err;
                }
            }
        }
    }

    fn dispatch_filing(&self, filing: secapi_core::StreamFiling) {
        let received_at = now_unix();
        let latency_ms = received_at - filing.filed_at;
        if latency_ms > self.config.latency_warning_threshold().as_secs() as i64 {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                accession_no = %filing.accession_no,
                latency_ms,
                "secapi.stream.latency_warning"
            );
        }

        let accession_no = filing.accession_no.clone();
        let ticker = filing.ticker.clone();
        let callbacks = self.callbacks.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            callbacks.emit(Event::Filing { filing, latency_ms, received_at });
        }));
        if outcome.is_err() {
            self.callbacks.emit(Event::CallbackError {
                callback: "on_filing",
                error_class: "CallbackPanic",
                error_message: format!("accession_no={accession_no}, ticker={ticker:?}"),
            });
        }
    }

    fn classify_close(&self, code: Option<u16>) -> CloseOutcome {
        match code {
            Some(1000) | Some(1001) | None => CloseOutcome::TerminalOk,
            Some(1008) => CloseOutcome::TerminalError(Error::Permanent(PermanentError::Authentication(
                AuthenticationError {
                    request_id: "stream".into(),
                    message: "[stream] policy violation (close code 1008)".into(),
                    status: 0,
                    headers: Default::default(),
                },
            ))),
            Some(other) => CloseOutcome::Reconnect(network_error(&format!("closed with code {other}"))),
        }
    }

    /// On disconnect, decides whether to keep reconnecting. `Ok(delay)`
    /// means sleep then retry; `Err` means attempts are exhausted (or the
    /// failure was terminal) and the caller should propagate `err`.
    fn prepare_reconnect(&self, err: Error) -> Result<Duration, Error> {
        self.state.mark_disconnected();
        let attempt = self.state.increment_attempts();

        if let Some(max) = self.config.max_attempts() {
            if attempt > max {
                return Err(err);
            }
        }

        self.state.mark_reconnecting();
        self.callbacks.emit(Event::Reconnect {
            attempt_count: attempt as usize,
            downtime_seconds: self.state.downtime_seconds(),
        });

        Ok(self.config.policy().delay_for_attempt(attempt as usize).unwrap_or(Duration::ZERO))
    }
}

enum CloseOutcome {
    TerminalOk,
    TerminalError(Error),
    Reconnect(Error),
}

fn network_error(detail: &str) -> Error {
    Error::Transient(TransientError::Network(NetworkError {
        request_id: "stream".into(),
        message: format!("[stream] {detail}"),
        kind: NetworkErrorKind::Other,
        headers: Default::default(),
    }))
}

fn build_url(feed_url: &str, api_key: &str) -> String {
    match url::Url::parse(feed_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("apiKey", api_key);
            url.to_string()
        }
        Err(_) => format!("{feed_url}?apiKey={api_key}"),
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
