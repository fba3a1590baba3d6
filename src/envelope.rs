//! The envelope: one in-flight send-or-receive, and the state machine it moves through.
//!
//! `INIT -> POSTED -> MATCHED -> COPYING -> DONE`. `POSTED -> MATCHED` and `COPYING -> DONE`
//! may be performed by the peer that matches against this envelope; the owning side only
//! ever reads the completion flag (§4.1).

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::datatype::Datatype;
use crate::error::TmpiError;

/// A raw borrowed buffer. The caller promises not to mutate a send buffer, nor read a
/// receive buffer, between posting and completion (§3 Ownership) — so a raw pointer can
/// cross threads safely as long as that promise holds; enforcing it is the caller's job,
/// exactly as in the original pointer-based interface.
#[derive(Clone, Copy)]
pub enum Buf {
    /// `TMPI_IN_PLACE`: the send buffer also serves as the receive buffer.
    Inline,
    /// A real buffer: base address and length in bytes.
    External(*mut u8, usize),
}

// SAFETY: `Buf::External` only ever crosses threads as part of an `Envelope` guarded by the
// rendezvous protocol in `mailbox.rs`, which enforces the non-overlapping-access contract
// documented above before either side touches the pointee.
unsafe impl Send for Buf {}
unsafe impl Sync for Buf {}

impl Buf {
    pub fn len(&self) -> usize {
        match self {
            Buf::Inline => 0,
            Buf::External(_, len) => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Range `[start, start+len)` for overlap detection, or `None` for `Inline`.
    pub fn range(&self) -> Option<(usize, usize)> {
        match self {
            Buf::Inline => None,
            Buf::External(ptr, len) => Some((*ptr as usize, *ptr as usize + len)),
        }
    }

    /// # Safety
    /// Caller must ensure exclusive access to `len` bytes starting at the buffer's base for
    /// the duration of the returned slice's use, per the rendezvous protocol.
    pub unsafe fn as_slice(&self, len: usize) -> &[u8] {
        match self {
            Buf::Inline => &[],
            Buf::External(ptr, _) => std::slice::from_raw_parts(*ptr, len),
        }
    }

    /// # Safety
    /// Caller must ensure exclusive access to `len` bytes starting at the buffer's base for
    /// the duration of the returned slice's use, per the rendezvous protocol.
    pub unsafe fn as_mut_slice(&self, len: usize) -> &mut [u8] {
        match self {
            Buf::Inline => &mut [],
            Buf::External(ptr, _) => std::slice::from_raw_parts_mut(*ptr, len),
        }
    }
}

/// Whether an envelope was posted by a sender or a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Send,
    Recv,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Init = 0,
    Posted = 1,
    Matched = 2,
    Copying = 3,
    Done = 4,
}

impl EnvelopeState {
    fn from_u8(v: u8) -> EnvelopeState {
        match v {
            0 => EnvelopeState::Init,
            1 => EnvelopeState::Posted,
            2 => EnvelopeState::Matched,
            3 => EnvelopeState::Copying,
            4 => EnvelopeState::Done,
            _ => unreachable!("invalid envelope state byte"),
        }
    }
}

/// One posted send or receive.
///
/// Once matched, `role`, the resolved peer, and the transferred byte count are frozen; the
/// completion flag transitions `0 -> 1` exactly once (§3 Envelope invariants).
pub struct Envelope {
    pub role: Role,
    /// Global id of the worker that issued this envelope (the actual source of a send, or
    /// the receiver itself for a receive). Used by the matcher to resolve wildcard filters.
    pub self_id: u32,
    /// Send: destination global worker id, used only to route the envelope to the right
    /// mailbox. Recv: source filter, `None` for `ANY_SOURCE`.
    pub peer: Option<u32>,
    /// Tag (always `Some` for a send); `None` for a wildcard receive (`ANY_TAG`).
    pub tag: Option<i32>,
    /// Isolation context of the communicator this envelope was posted against.
    pub isolation: u64,
    pub datatype: Datatype,
    pub count: usize,
    pub buf: Buf,
    /// Length in bytes actually available in `buf` (the send length, or the receive capacity).
    pub capacity: usize,

    state: AtomicU8,
    /// Filled in at match: resolved peer global id and tag (meaningful for wildcard receives).
    pub(crate) resolved_peer: std::sync::Mutex<Option<(u32, i32)>>,
    pub(crate) transferred: std::sync::atomic::AtomicUsize,
    pub(crate) error: std::sync::atomic::AtomicI32,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("role", &self.role)
            .field("self_id", &self.self_id)
            .field("peer", &self.peer)
            .field("tag", &self.tag)
            .field("state", &self.state())
            .finish()
    }
}

impl Envelope {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        role: Role,
        self_id: u32,
        peer: Option<u32>,
        tag: Option<i32>,
        isolation: u64,
        datatype: Datatype,
        count: usize,
        buf: Buf,
        capacity: usize,
    ) -> Envelope {
        Envelope {
            role,
            self_id,
            peer,
            tag,
            isolation,
            datatype,
            count,
            buf,
            capacity,
            state: AtomicU8::new(EnvelopeState::Init as u8),
            resolved_peer: std::sync::Mutex::new(None),
            transferred: std::sync::atomic::AtomicUsize::new(0),
            error: std::sync::atomic::AtomicI32::new(crate::error::SUCCESS),
        }
    }

    pub fn state(&self) -> EnvelopeState {
        EnvelopeState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, s: EnvelopeState) {
        self.state.store(s as u8, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.state() == EnvelopeState::Done
    }

    pub(crate) fn mark_done(&self, resolved: (u32, i32), transferred: usize, error: Outcome) {
        *self.resolved_peer.lock().unwrap() = Some(resolved);
        self.transferred.store(transferred, Ordering::Relaxed);
        self.error.store(error.code(), Ordering::Relaxed);
        self.set_state(EnvelopeState::Done);
    }
}

/// Either success or a specific error code, used only when marking an envelope done.
pub(crate) enum Outcome {
    Ok,
    Err(TmpiError),
}

impl Outcome {
    fn code(&self) -> i32 {
        match self {
            Outcome::Ok => crate::error::SUCCESS,
            Outcome::Err(e) => e.as_code(),
        }
    }
}

/// Shared, reference-counted handle to an envelope, so both the posting side and the
/// matching side can hold it simultaneously (one owns it until `wait`/`test`, the other
/// borrows it only for the duration of the copy).
pub type EnvelopeHandle = Arc<Envelope>;
