//! Span de-duplication
//!
//! Instrumentation can double-fire: a processor flushes a span, then the
//! provider flushes it again on shutdown. The cache remembers recently seen
//! `(trace_id, span_id)` pairs so the second sighting is dropped before it
//! reaches the wire. Bounded FIFO, in-memory, per-process: a best-effort
//! guard, not a correctness mechanism; callers must tolerate the occasional
//! duplicate delivery.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

pub const DEFAULT_MAX_TRACKED: usize = 10_000;

#[derive(Debug, Default)]
struct Inner {
    seen: HashSet<(String, String)>,
    order: VecDeque<(String, String)>,
}

/// Bounded FIFO cache of already-exported span identities.
#[derive(Debug)]
pub struct SpanDedupeCache {
    max_size: usize,
    inner: Mutex<Inner>,
}

impl Default for SpanDedupeCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRACKED)
    }
}

impl SpanDedupeCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Record a span identity, returning `true` on first sighting.
    ///
    /// A missing trace id skips de-duplication entirely. Check-and-insert
    /// runs under one lock so two concurrent callers cannot both observe
    /// "not present" for the same pair.
    pub fn add(&self, trace_id: Option<&str>, span_id: &str) -> bool {
        let Some(trace_id) = trace_id else {
            return true;
        };
        let key = (trace_id.to_string(), span_id.to_string());

        let mut inner = self.inner.lock();
        if inner.seen.contains(&key) {
            return false;
        }
        while inner.order.len() >= self.max_size {
            if let Some(oldest) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            }
        }
        inner.order.push_back(key.clone());
        inner.seen.insert(key);
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().order.len()
    }
}
