//! `RateLimitState` and the per-client `RateLimitTracker`.
//!
//! The tracker owns exactly one mutex guarding both the state snapshot and
//! the queue counter (§4.4.4). Every method here is synchronous and returns
//! quickly; the sleep a caller performs after reading state always happens
//! outside this lock.

use std::sync::Mutex;

/// Immutable snapshot of the server-reported quota. Any field may be
/// unknown. The tracker replaces this wholesale on each update, never
/// mutates in place.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateLimitState {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Unix seconds.
    pub reset_at: Option<i64>,
}

impl RateLimitState {
    pub fn exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    pub fn available(&self) -> bool {
        match self.remaining {
            None => true,
            Some(r) => r > 0,
        }
    }

    pub fn percentage_remaining(&self) -> Option<f64> {
        match (self.remaining, self.limit) {
            (Some(remaining), Some(limit)) if limit > 0 => {
                Some(remaining as f64 / limit as f64 * 100.0)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerInner {
    state: RateLimitState,
    queued_count: u64,
}

/// Per-client mutable holder. Created with the client, discarded with it —
/// owned by the client, handed by reference into the pipeline.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    inner: Mutex<TrackerInner>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies only the fields actually present in the response; fields left
    /// `None` here do not regress previously-known state to unknown.
    pub fn update(&self, limit: Option<u64>, remaining: Option<u64>, reset_at: Option<i64>) {
        let mut guard = self.inner.lock().expect("rate limit tracker poisoned");
        if let Some(limit) = limit {
            guard.state.limit = Some(limit);
        }
        if let Some(remaining) = remaining {
            guard.state.remaining = Some(remaining);
        }
        if let Some(reset_at) = reset_at {
            guard.state.reset_at = Some(reset_at);
        }
    }

    pub fn reset(&self) {
        let mut guard = self.inner.lock().expect("rate limit tracker poisoned");
        guard.state = RateLimitState::default();
    }

    pub fn current_state(&self) -> RateLimitState {
        self.inner.lock().expect("rate limit tracker poisoned").state
    }

    pub fn increment_queued(&self) -> u64 {
        let mut guard = self.inner.lock().expect("rate limit tracker poisoned");
        guard.queued_count += 1;
        guard.queued_count
    }

    pub fn decrement_queued(&self) -> u64 {
        let mut guard = self.inner.lock().expect("rate limit tracker poisoned");
        guard.queued_count = guard.queued_count.saturating_sub(1);
        guard.queued_count
    }

    pub fn queued_count(&self) -> u64 {
        self.inner.lock().expect("rate limit tracker poisoned").queued_count
    }
}
