//! The collective engine: barrier, broadcast, scatter(v), gather(v), all-to-all(v), reduce,
//! allreduce, all layered over a communicator's scratch region (§4.4).
//!
//! Every collective here follows the same round shape used by
//! [`crate::comm::create`]/[`crate::comm::split`]: an entry barrier (so no caller can observe
//! a slot left over from the previous round), publication into the publisher(s)' own scratch
//! slot, a closing barrier (so every publish is visible before anyone reads), then reads. No
//! round needs an explicit clear: the next collective's own entry barrier cannot complete
//! until every reader of this round — including the slowest one — has already reached it, so
//! no later collective can ever observe stale scratch data.
//!
//! That is not enough on its own, though: `bcast`/`scatter(v)`/`gather(v)`/`alltoall(v)`
//! publish pointers straight into the *caller's* send/recv buffers, and a caller is free to
//! reuse that buffer the instant the call returns — there may be no further collective call to
//! pin its lifetime against. Each of those therefore ends its round with one more barrier,
//! after every reader has finished its `copy_from_slice`, so no publisher returns while a peer
//! might still be mid-copy out of its buffer (§4.4 Broadcast: "the root waits for the 'all
//! done' count... so the source buffer remains stable during the read"). `reduce` publishes
//! into a private accumulator instead of the caller's buffer, so intermediate tree levels need
//! no extra barrier — every rank, retired or not, keeps looping through the remaining levels,
//! so a publisher's accumulator stays alive and unread-from-under regardless of its role. The
//! *last* tree level has no following level to protect it that way, so `reduce` adds the same
//! one trailing barrier after the whole tree completes, before any rank returns.

mod alltoall;
mod bcast;
mod reduce;
mod scatter_gather;

pub use alltoall::{alltoall, alltoallv};
pub use bcast::bcast;
pub use reduce::{allreduce, reduce};
pub use scatter_gather::{gather, gatherv, scatter, scatterv};

use crate::comm::Comm;
use crate::error::Result;
use crate::worker;

/// `tMPI_Barrier`: block until every member of `comm` has called this.
pub fn barrier(comm: &Comm) -> Result<()> {
    comm.scratch.barrier();
    Ok(())
}

/// The calling thread's rank within `comm`, used throughout this module to index scratch
/// slots and loop bounds.
fn my_rank(comm: &Comm) -> Result<usize> {
    let id = worker::current_id()?;
    comm.rank_of(id)
}
