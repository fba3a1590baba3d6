//! Reduce and allreduce (§4.4).

use crate::comm::{Comm, PublishedBuf};
use crate::datatype::Datatype;
use crate::error::{Result, TmpiError};
use crate::op::ReduceOp;

use super::my_rank;

/// `tMPI_Reduce`: combine every member's `sendbuf` with `op`, leaving the result in `root`'s
/// `recvbuf`. A binary tree of height `ceil(log2(size))`: ranks are renumbered relative to
/// `root` (so `root` always occupies tree position 0) without moving any data — only which
/// rank plays which tree role changes, not the scratch-slot each rank reads or writes, which
/// stays indexed by its real rank throughout.
pub fn reduce(
    comm: &Comm,
    sendbuf: &[u8],
    recvbuf: Option<&mut [u8]>,
    count: usize,
    datatype: &Datatype,
    op: ReduceOp,
    root: i32,
) -> Result<()> {
    let result = (|| {
        op.check(datatype)?;
        let width = datatype.size_bytes();
        let nbytes = count * width;
        if sendbuf.len() < nbytes {
            return Err(TmpiError::Buf);
        }

        let size = comm.size();
        let root = root as usize;
        let rank = my_rank(comm)?;

        // Position of `r` in the root-rotated tree: root always sits at position 0.
        let pos = |r: usize| (r + size - root) % size;
        let unpos = |p: usize| (p + root) % size;

        let my_pos = pos(rank);
        let mut acc = sendbuf[..nbytes].to_vec();

        let mut step = 1usize;
        while step < size {
            if my_pos % (2 * step) == 0 {
                let partner_pos = my_pos + step;
                comm.scratch.barrier();
                comm.scratch.barrier();
                if partner_pos < size {
                    let partner = unpos(partner_pos);
                    let published =
                        comm.scratch.read(partner).expect("partner publishes before the closing barrier");
                    // SAFETY: see the module-level safety note in `collective/mod.rs`.
                    let src = unsafe { std::slice::from_raw_parts(published.ptr, published.len.min(nbytes)) };
                    op.apply(datatype, &mut acc, src, count);
                }
            } else if my_pos % (2 * step) == step {
                comm.scratch.barrier();
                comm.scratch.publish(rank, Some(PublishedBuf { ptr: acc.as_mut_ptr(), len: nbytes }));
                comm.scratch.barrier();
            } else {
                comm.scratch.barrier();
                comm.scratch.barrier();
            }
            step *= 2;
        }

        // Every intermediate level's publish is protected by the next level's entry barrier
        // (every rank, retired or not, keeps calling barrier() each level, so this stack frame
        // and `acc` stay alive until the combiner has read it). There is no next level after
        // the last one, though, so without this the final level's publisher could return —
        // dropping its `acc` — while the combiner is still mid-copy out of it.
        comm.scratch.barrier();

        if rank == root {
            if let Some(buf) = recvbuf {
                buf[..nbytes].copy_from_slice(&acc);
            }
        }
        Ok(())
    })();
    comm.error_handler().handle(result)
}

/// `tMPI_Allreduce`: [`reduce`] to an internal root, then [`super::bcast`] the result to
/// every member — two collective rounds under one call, rather than a literal single-pass
/// fused algorithm, but every member passes through the same sequence of barriers either way.
pub fn allreduce(
    comm: &Comm,
    sendbuf: &[u8],
    recvbuf: &mut [u8],
    count: usize,
    datatype: &Datatype,
    op: ReduceOp,
) -> Result<()> {
    let outcome = (|| {
        let nbytes = count * datatype.size_bytes();
        if recvbuf.len() < nbytes {
            return Err(TmpiError::Buf);
        }
        let mut result = vec![0u8; nbytes];
        reduce(comm, sendbuf, Some(&mut result), count, datatype, op, 0)?;
        super::bcast(comm, &mut result, count, datatype, 0)?;
        recvbuf[..nbytes].copy_from_slice(&result);
        Ok(())
    })();
    comm.error_handler().handle(outcome)
}
