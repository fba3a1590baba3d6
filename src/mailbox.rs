//! Per-worker mailbox: posted receives, unexpected sends, and the matching routine.
//!
//! Guarded by a single `parking_lot::Mutex`; waiters block on a `parking_lot::Condvar`
//! attached to that mutex (§3 Mailbox). A new envelope entering the mailbox is matched
//! against the opposite queue before being appended to its own (§3 invariant).

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::envelope::{Buf, Envelope, EnvelopeHandle, EnvelopeState, Outcome, Role};
use crate::error::TmpiError;

struct Inner {
    /// Receives this worker has entered but that have not yet been satisfied.
    posted_receives: VecDeque<EnvelopeHandle>,
    /// Sends targeted at this worker that arrived before a matching receive.
    unexpected_sends: VecDeque<EnvelopeHandle>,
}

/// A worker's inbox.
pub struct Mailbox {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl Mailbox {
    pub fn new() -> Mailbox {
        Mailbox {
            inner: Mutex::new(Inner {
                posted_receives: VecDeque::new(),
                unexpected_sends: VecDeque::new(),
            }),
            cond: Condvar::new(),
        }
    }

    /// Post a send envelope into this (the destination's) mailbox.
    ///
    /// Scans posted-receives for a match first; on no match, appends to unexpected-sends.
    pub fn post_send(&self, send: EnvelopeHandle) {
        let mut inner = self.inner.lock();
        if let Some(pos) = find_match(&inner.posted_receives, &send) {
            let recv = inner.posted_receives.remove(pos).unwrap();
            drop(inner);
            complete_match(&recv, &send);
            self.cond.notify_all();
        } else {
            send.set_state(EnvelopeState::Posted);
            inner.unexpected_sends.push_back(send);
        }
    }

    /// Post a receive envelope into this (the receiver's own) mailbox.
    ///
    /// Scans unexpected-sends for a match first; on no match, appends to posted-receives.
    pub fn post_recv(&self, recv: EnvelopeHandle) {
        let mut inner = self.inner.lock();
        if let Some(pos) = find_match(&inner.unexpected_sends, &recv) {
            let send = inner.unexpected_sends.remove(pos).unwrap();
            drop(inner);
            complete_match(&recv, &send);
            self.cond.notify_all();
        } else {
            recv.set_state(EnvelopeState::Posted);
            inner.posted_receives.push_back(recv);
        }
    }

    /// Block the calling thread until `envelope` completes.
    pub fn wait_done(&self, envelope: &Envelope) {
        if envelope.is_done() {
            return;
        }
        let mut inner = self.inner.lock();
        while !envelope.is_done() {
            self.cond.wait(&mut inner);
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Mailbox::new()
    }
}

/// First-match-wins FIFO scan (§4.1 Matching rule): same isolation context, and (exact
/// source/tag or a wildcard on the *receive* side). A send's own `peer` field is its
/// destination (used only for routing to this mailbox); the id the matcher compares against
/// a receive's source filter is the send's `self_id`, the actual issuing worker.
fn find_match(queue: &VecDeque<EnvelopeHandle>, subject: &EnvelopeHandle) -> Option<usize> {
    match subject.role {
        Role::Send => {
            // subject is a send being posted; queue holds posted receives at the destination.
            queue.iter().position(|recv| {
                recv.isolation == subject.isolation
                    && (recv.peer.is_none() || recv.peer == Some(subject.self_id))
                    && (recv.tag.is_none() || recv.tag == subject.tag)
            })
        }
        Role::Recv => {
            // subject is a receive being posted; queue holds unexpected sends at this worker.
            queue.iter().position(|send| {
                send.isolation == subject.isolation
                    && (subject.peer.is_none() || subject.peer == Some(send.self_id))
                    && (subject.tag.is_none() || subject.tag == send.tag)
            })
        }
    }
}

/// Resolve a matched (recv, send) pair: copy the payload (receiver's job, §4.1 Copy side),
/// then flip both sides to `Done` with their resolved status fields.
fn complete_match(recv: &EnvelopeHandle, send: &EnvelopeHandle) {
    recv.set_state(EnvelopeState::Matched);
    send.set_state(EnvelopeState::Matched);
    recv.set_state(EnvelopeState::Copying);

    let recv_resolved = (send.self_id, send.tag.unwrap_or(0));
    let send_resolved = (send.peer.unwrap_or(0), send.tag.unwrap_or(0));

    if buffers_overlap(recv, send) {
        recv.mark_done(recv_resolved, 0, Outcome::Err(TmpiError::XferBufOverlap));
        send.mark_done(send_resolved, 0, Outcome::Err(TmpiError::XferBufOverlap));
        return;
    }

    let transferred = send.capacity.min(recv.capacity);
    // SAFETY: both envelopes are in `Copying` state and neither side touches its buffer
    // again until the other's completion flag (checked via `is_done`) is observed, per the
    // ownership contract in §3.
    unsafe {
        if transferred > 0 {
            if let (Buf::External(_, _), Buf::External(_, _)) = (&send.buf, &recv.buf) {
                let src = send.buf.as_slice(transferred);
                let dst = recv.buf.as_mut_slice(transferred);
                dst.copy_from_slice(src);
            }
        }
    }

    if send.capacity > recv.capacity {
        recv.mark_done(recv_resolved, transferred, Outcome::Err(TmpiError::XferBufsize));
        send.mark_done(send_resolved, transferred, Outcome::Ok);
    } else {
        recv.mark_done(recv_resolved, transferred, Outcome::Ok);
        send.mark_done(send_resolved, transferred, Outcome::Ok);
    }
}

fn buffers_overlap(recv: &EnvelopeHandle, send: &EnvelopeHandle) -> bool {
    match (recv.buf.range(), send.buf.range()) {
        (Some((rs, re)), Some((ss, se))) => rs < se && ss < re,
        _ => false,
    }
}
