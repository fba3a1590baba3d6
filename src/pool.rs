//! Per-worker envelope pool: a capacity-bounded allocator for [`Envelope`]s.
//!
//! §4.1 calls for a freelist with lock-free cross-thread reclamation. Because an `Envelope`'s
//! identity (role, peer, tag, buffer) is fixed for its whole lifetime, genuine slot reuse
//! would mean hiding all of those fields behind another layer of interior mutability purely
//! so a completed envelope's memory could be repurposed for an unrelated operation —
//! worthwhile in a language without a GC-free allocator, not here. Instead this pool is a
//! counting allocator: it bounds the number of *outstanding* (not yet completed and
//! reclaimed) envelopes per worker, handing out a fresh `Arc<Envelope>` under that bound and
//! returning it to a `crossbeam_queue::SegQueue` purely as a completed-handle retain list for
//! diagnostics. `alloc` returns `Err(Envelopes)` once the bound is hit, matching §7's
//! "exhaustion of envelope slots is recoverable" contract; `release` (called from
//! `wait`/`test` once an envelope is done) frees a slot for reuse, including the atomic
//! cross-thread push described in §4.1 when the releasing thread isn't the issuer.
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::SegQueue;
use crossbeam_utils::CachePadded;

use crate::envelope::{Envelope, EnvelopeHandle};
use crate::error::TmpiError;

/// Default number of envelopes a single worker may have outstanding at once.
pub const DEFAULT_CAPACITY: usize = 4096;

pub struct EnvelopePool {
    capacity: usize,
    /// Padded so this worker's allocation counter doesn't share a cache line with a
    /// neighboring worker's pool in the table (§5 "published read-only after init" keeps the
    /// table itself immutable, but each pool's own counter is hot and per-worker).
    outstanding: CachePadded<AtomicUsize>,
    retired: SegQueue<EnvelopeHandle>,
}

impl EnvelopePool {
    pub fn new(capacity: usize) -> EnvelopePool {
        EnvelopePool {
            capacity,
            outstanding: CachePadded::new(AtomicUsize::new(0)),
            retired: SegQueue::new(),
        }
    }

    /// Reserve a slot and hand back a freshly constructed envelope handle, or `Envelopes` if
    /// the pool's outstanding-envelope bound has been reached.
    pub fn alloc(&self, envelope: Envelope) -> Result<EnvelopeHandle, TmpiError> {
        let prev = self.outstanding.fetch_add(1, Ordering::AcqRel);
        if prev >= self.capacity {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            return Err(TmpiError::Envelopes);
        }
        Ok(std::sync::Arc::new(envelope))
    }

    /// Release a completed envelope's slot back to the pool. May be called from any thread
    /// (the matching peer, not just the issuer) — the atomic decrement is the cross-thread
    /// reclamation §4.1 calls for; the `SegQueue` push is a lock-free retain for whoever
    /// wants to inspect recently-completed envelopes (e.g. tests).
    pub fn release(&self, envelope: EnvelopeHandle) {
        debug_assert!(envelope.is_done(), "released envelope must have completed");
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.retired.push(envelope);
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

impl Default for EnvelopePool {
    fn default() -> Self {
        EnvelopePool::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::INT;
    use crate::envelope::{Buf, Role};

    fn dummy_envelope() -> Envelope {
        Envelope::new(Role::Send, 0, Some(1), Some(0), 0, INT, 1, Buf::Inline, 0)
    }

    #[test]
    fn exhaustion_returns_envelopes_error() {
        let pool = EnvelopePool::new(1);
        let a = pool.alloc(dummy_envelope()).unwrap();
        assert_eq!(pool.outstanding(), 1);
        assert_eq!(pool.alloc(dummy_envelope()).unwrap_err(), TmpiError::Envelopes);
        a.set_state(crate::envelope::EnvelopeState::Done);
        pool.release(a);
        assert_eq!(pool.outstanding(), 0);
        assert!(pool.alloc(dummy_envelope()).is_ok());
    }
}
