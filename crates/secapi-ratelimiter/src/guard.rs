//! Release-on-all-paths guard for the queue counter.
//!
//! Mirrors the scoped-cleanup idiom `secapi_core::events::Callbacks::emit`
//! uses around `catch_unwind`: acquire, run arbitrary caller code (which may
//! panic, or whose own callback may panic), release unconditionally via
//! `Drop`. `on_dequeue` is emitted from `Drop` itself so a panic anywhere in
//! the queueing section — even inside `on_queue` — still leaves the counter
//! and the dequeue notification consistent.

use std::sync::Arc;
use std::time::Instant;

use secapi_core::{Callbacks, Event, RateLimitTracker};

pub struct QueueGuard {
    tracker: Arc<RateLimitTracker>,
    callbacks: Arc<Callbacks>,
    request_id: String,
    entered_at: Instant,
}

impl QueueGuard {
    /// Increments `queued_count` and returns a guard that decrements it and
    /// emits `on_dequeue` on drop, however the caller's scope exits.
    pub fn enter(tracker: Arc<RateLimitTracker>, callbacks: Arc<Callbacks>, request_id: String) -> (Self, u64) {
        let size = tracker.increment_queued();
        (Self { tracker, callbacks, request_id, entered_at: Instant::now() }, size)
    }

}

impl Drop for QueueGuard {
    fn drop(&mut self) {
        let queue_size_after = self.tracker.decrement_queued();
        let waited_ms = self.entered_at.elapsed().as_millis() as u64;
        self.callbacks.emit(Event::Dequeue {
            request_id: self.request_id.clone(),
            queue_size_after,
            waited_ms,
        });
    }
}
