//! Connection state tracking for the streaming client's reconnect FSM.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// States of the streaming connection, per spec.md §4.6. `Closed` is
/// terminal: once reached, the client never reconnects on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// Shared, cross-task connection state. Cloning yields another handle onto
/// the same atomics, mirroring the teacher's `ReconnectState`. `epoch` is
/// the instant the state was created; `last_connected` stores millis since
/// `epoch` rather than a raw `Instant`, since only integers are atomic.
#[derive(Clone)]
pub struct StreamState {
    epoch: Instant,
    state: Arc<AtomicU64>,
    attempts: Arc<AtomicU32>,
    last_connected: Arc<AtomicU64>,
    /// Checked before dispatching each filing in a frame so `close()` can
    /// stop mid-frame without waiting for the whole frame to drain.
    running: Arc<AtomicBool>,
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            state: Arc::new(AtomicU64::new(Self::encode(ConnectionState::Disconnected))),
            attempts: Arc::new(AtomicU32::new(0)),
            last_connected: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        Self::decode(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(Self::encode(state), Ordering::Release);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    pub fn increment_attempts(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn reset_attempts(&self) {
        self.attempts.store(0, Ordering::Release);
    }

    pub fn mark_connected(&self) {
        self.set_state(ConnectionState::Connected);
        self.reset_attempts();
        self.last_connected.store(self.millis_since_epoch(), Ordering::Release);
    }

    pub fn mark_disconnected(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    pub fn mark_reconnecting(&self) {
        self.set_state(ConnectionState::Reconnecting);
    }

    pub fn mark_closed(&self) {
        self.set_state(ConnectionState::Closed);
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Downtime since the last successful connection, in whole seconds.
    pub fn downtime_seconds(&self) -> f64 {
        let last = self.last_connected.load(Ordering::Acquire);
        if last == 0 {
            return 0.0;
        }
        self.millis_since_epoch().saturating_sub(last) as f64 / 1000.0
    }

    fn millis_since_epoch(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn encode(state: ConnectionState) -> u64 {
        match state {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting => 3,
            ConnectionState::Closed => 4,
        }
    }

    fn decode(encoded: u64) -> ConnectionState {
        match encoded {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Closed,
        }
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamState")
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .field("running", &self.is_running())
            .finish()
    }
}
