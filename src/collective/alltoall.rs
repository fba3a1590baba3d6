//! All-to-all(v) (§4.4).

use crate::comm::{Comm, PublishedBuf};
use crate::datatype::Datatype;
use crate::error::{Result, TmpiError};

use super::my_rank;

/// `tMPI_Alltoall`: every member sends a distinct, equal-sized chunk to every other member.
/// `sendbuf` holds `size(comm)` contiguous chunks of `count` elements, ordered by destination
/// rank; `recvbuf` receives one chunk from each source rank, ordered by source rank.
pub fn alltoall(comm: &Comm, sendbuf: &[u8], recvbuf: &mut [u8], count: usize, datatype: &Datatype) -> Result<()> {
    let size = comm.size();
    let counts = vec![count; size];
    alltoallv(comm, sendbuf, &counts, recvbuf, &counts, datatype)
}

/// `tMPI_Alltoallv`: as [`alltoall`], with a per-destination send count and per-source receive
/// count. Both `sendbuf` and `recvbuf` are packed contiguously in rank order according to
/// `sendcounts`/`recvcounts` (no separate displacement arrays: the running sum of counts is
/// the displacement, matching the common packed layout). Each source's `sendcounts` is
/// transmitted to every destination alongside its buffer, so a destination's read offset
/// comes from the source's real per-destination schedule rather than an offset re-derived
/// from the destination's own `recvcounts`.
pub fn alltoallv(
    comm: &Comm,
    sendbuf: &[u8],
    sendcounts: &[usize],
    recvbuf: &mut [u8],
    recvcounts: &[usize],
    datatype: &Datatype,
) -> Result<()> {
    let result = (|| {
        let width = datatype.size_bytes();
        let size = comm.size();
        if sendcounts.len() != size || recvcounts.len() != size {
            return Err(TmpiError::MultiMismatch);
        }
        let rank = my_rank(comm)?;

        comm.scratch.barrier();
        comm.scratch.publish(rank, Some(PublishedBuf { ptr: sendbuf.as_ptr() as *mut u8, len: sendbuf.len() }));
        // Publish this rank's own `sendcounts` alongside its buffer, so every destination
        // derives its displacement into `sendbuf` from the real per-destination schedule
        // instead of assuming the symmetric (equal-count) case.
        comm.scratch
            .publish_aux(rank, Some(PublishedBuf { ptr: sendcounts.as_ptr() as *mut u8, len: sendcounts.len() }));
        comm.scratch.barrier();

        let mut recv_offset = 0usize;
        for src in 0..size {
            let recv_nbytes = recvcounts[src] * width;
            let published = comm.scratch.read(src).expect("every member publishes before the closing barrier");
            let aux = comm.scratch.read_aux(src).expect("every member publishes its counts table");
            // SAFETY: every member keeps both `sendbuf` and `sendcounts` alive and untouched
            // until the trailing barrier below, which it cannot pass until this loop is done.
            let their_sendcounts = unsafe { std::slice::from_raw_parts(aux.ptr as *const usize, aux.len) };
            if their_sendcounts.len() != size {
                return Err(TmpiError::MultiMismatch);
            }
            let their_count_for_me = their_sendcounts[rank];
            if their_count_for_me * width != recv_nbytes {
                return Err(TmpiError::MultiMismatch);
            }
            let send_offset = their_sendcounts[..rank].iter().sum::<usize>() * width;
            if send_offset + recv_nbytes <= published.len {
                let src_slice =
                    unsafe { std::slice::from_raw_parts(published.ptr.add(send_offset), recv_nbytes) };
                recvbuf[recv_offset..recv_offset + recv_nbytes].copy_from_slice(src_slice);
            }
            recv_offset += recv_nbytes;
        }
        // Every member must wait here: others are still reading out of this member's
        // `sendbuf` until their own loop above completes.
        comm.scratch.barrier();
        Ok(())
    })();
    comm.error_handler().handle(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::world_comm;
    use crate::datatype::INT;

    #[test]
    fn alltoall_transposes_chunks() {
        let comm = world_comm(3);
        std::thread::scope(|s| {
            for i in 0u32..3 {
                let comm = &comm;
                s.spawn(move || {
                    crate::worker::bind_current(i);
                    // Rank i sends (i,dest) pairs encoded as i*10+dest to each destination.
                    let send: Vec<u8> = (0..3u32)
                        .flat_map(|dest| ((i * 10 + dest) as i32).to_ne_bytes())
                        .collect();
                    let mut recv = vec![0u8; 12];
                    alltoall(comm, &send, &mut recv, 1, &INT).unwrap();
                    let got: Vec<i32> =
                        recv.chunks_exact(4).map(|c| i32::from_ne_bytes(c.try_into().unwrap())).collect();
                    let expected: Vec<i32> = (0..3u32).map(|src| (src * 10 + i) as i32).collect();
                    assert_eq!(got, expected);
                });
            }
        });
    }

    #[test]
    fn alltoallv_irregular_counts() {
        // 3 workers; every source sends (dest+1) ints to destination `dest`, so sendcounts =
        // [1, 2, 3] (indexed by destination) at every rank, but recvcounts at rank r is
        // [r+1, r+1, r+1] (indexed by source) — a genuinely non-uniform schedule that a
        // stride derived from the reader's own recvcount could not reproduce.
        let comm = world_comm(3);
        let sendcounts = [1usize, 2, 3];
        std::thread::scope(|s| {
            for i in 0u32..3 {
                let comm = &comm;
                let sendcounts = &sendcounts;
                s.spawn(move || {
                    crate::worker::bind_current(i);
                    let send: Vec<u8> = (0..3u32)
                        .flat_map(|dest| {
                            std::iter::repeat((i * 10 + dest) as i32).take(sendcounts[dest as usize])
                        })
                        .flat_map(|v| v.to_ne_bytes())
                        .collect();
                    let recvcounts = [sendcounts[i as usize]; 3];
                    let total_recv: usize = recvcounts.iter().sum();
                    let mut recv = vec![0u8; total_recv * 4];
                    alltoallv(comm, &send, sendcounts, &mut recv, &recvcounts, &INT).unwrap();
                    let got: Vec<i32> =
                        recv.chunks_exact(4).map(|c| i32::from_ne_bytes(c.try_into().unwrap())).collect();
                    let expected: Vec<i32> = (0..3u32)
                        .flat_map(|src| std::iter::repeat((src * 10 + i) as i32).take(sendcounts[i as usize]))
                        .collect();
                    assert_eq!(got, expected);
                });
            }
        });
    }
}
