//! Deferred reporting of render failures.
//!
//! The audio thread may not log. It pushes a small `Copy` record into a
//! bounded lock-free queue and a control thread drains and logs it later.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;
use relay_core::{RenderFailure, SessionHandle};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderEvent {
    /// Host cycle counter at the time of failure (1-based).
    pub cycle: u64,
    pub session: Option<SessionHandle>,
    pub failure: RenderFailure,
}

pub struct EventSink {
    queue: ArrayQueue<RenderEvent>,
    dropped: AtomicU64,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Realtime safe. A full queue drops the event and counts it.
    #[inline(always)]
    pub fn record(&self, event: RenderEvent) {
        if self.queue.push(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Hand every queued event to `f`. Returns how many were drained.
    pub fn drain(&self, mut f: impl FnMut(RenderEvent)) -> usize {
        let mut count = 0;
        while let Some(event) = self.queue.pop() {
            f(event);
            count += 1;
        }
        count
    }

    /// Drain and log. Not realtime safe.
    ///
    /// Each event goes out at debug level; a warn line summarizes the batch so
    /// a dead generator does not flood the log every tick.
    pub fn log_pending(&self) -> usize {
        let mut first: Option<RenderEvent> = None;
        let mut last: Option<RenderEvent> = None;
        let count = self.drain(|event| {
            debug!(cycle = event.cycle, session = ?event.session, kind = event.failure.kind(), "render cycle failed: {}", event.failure);
            first.get_or_insert(event);
            last = Some(event);
        });

        if let (Some(first), Some(last)) = (first, last) {
            warn!(
                failed = count,
                first_cycle = first.cycle,
                last_cycle = last.cycle,
                kind = last.failure.kind(),
                dropped_total = self.dropped(),
                "render cycles fell back to silence"
            );
        }
        count
    }
}
