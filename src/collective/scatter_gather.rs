//! Scatter(v) and gather(v) (§4.4).

use crate::comm::{Comm, PublishedBuf};
use crate::datatype::Datatype;
use crate::error::{Result, TmpiError};

use super::my_rank;

/// `tMPI_Scatter`: root's `sendbuf` holds `size(comm)` contiguous chunks of `count` elements
/// each; every member (including root, unless `recvbuf` aliases `sendbuf` for `IN_PLACE`)
/// receives the chunk at its own rank.
pub fn scatter(
    comm: &Comm,
    sendbuf: Option<&[u8]>,
    recvbuf: &mut [u8],
    count: usize,
    datatype: &Datatype,
    root: i32,
) -> Result<()> {
    let counts = vec![count; comm.size()];
    scatterv(comm, sendbuf.map(|b| (b, counts.as_slice())), recvbuf, count, datatype, root)
}

/// `tMPI_Scatterv`: as [`scatter`], but each destination rank may receive a different count.
/// `send` is `(buffer, counts)`, one count per destination rank; each rank's displacement
/// into root's buffer is the running sum of the counts before it, so chunks are packed
/// contiguously in rank order. `counts` is transmitted to every caller (not just root), so an
/// irregular schedule is read correctly regardless of what the caller's own `recvcount` is.
pub fn scatterv(
    comm: &Comm,
    send: Option<(&[u8], &[usize])>,
    recvbuf: &mut [u8],
    recvcount: usize,
    datatype: &Datatype,
    root: i32,
) -> Result<()> {
    let result = (|| {
        let width = datatype.size_bytes();
        let recv_nbytes = recvcount * width;
        if recvbuf.len() < recv_nbytes {
            return Err(TmpiError::Buf);
        }
        let rank = my_rank(comm)?;
        let root = root as usize;

        comm.scratch.barrier();
        if rank == root {
            let (buf, counts) = send.ok_or(TmpiError::Buf)?;
            if counts.len() != comm.size() {
                return Err(TmpiError::MultiMismatch);
            }
            comm.scratch.publish(root, Some(PublishedBuf { ptr: buf.as_ptr() as *mut u8, len: buf.len() }));
            // Publish the real per-destination counts alongside the buffer, so every reader
            // derives its displacement from root's actual schedule instead of guessing an
            // equal-chunk layout from its own `recvcount`.
            comm.scratch.publish_aux(root, Some(PublishedBuf { ptr: counts.as_ptr() as *mut u8, len: counts.len() }));
        }
        comm.scratch.barrier();

        if rank != root {
            let published = comm.scratch.read(root).expect("root must publish before the closing barrier");
            let aux = comm.scratch.read_aux(root).expect("root must publish its counts table");
            // SAFETY: root keeps both `buf` and `counts` alive and untouched until the
            // trailing barrier below, which it cannot pass until every reader is done here.
            let counts = unsafe { std::slice::from_raw_parts(aux.ptr as *const usize, aux.len) };
            let my_count = *counts.get(rank).ok_or(TmpiError::MultiMismatch)?;
            if my_count * width != recv_nbytes {
                return Err(TmpiError::MultiMismatch);
            }
            let offset = counts[..rank].iter().sum::<usize>() * width;
            if offset + recv_nbytes > published.len {
                return Err(TmpiError::XferBufsize);
            }
            let src = unsafe { std::slice::from_raw_parts(published.ptr.add(offset), recv_nbytes) };
            recvbuf[..recv_nbytes].copy_from_slice(src);
        } else if let Some((buf, counts)) = send {
            let offset = counts[..rank].iter().sum::<usize>() * width;
            if offset + recv_nbytes <= buf.len() {
                recvbuf[..recv_nbytes].copy_from_slice(&buf[offset..offset + recv_nbytes]);
            }
        }
        // Root must not return (and so must not let its caller reuse `buf`) until every
        // reader above has finished copying out of it.
        comm.scratch.barrier();
        Ok(())
    })();
    comm.error_handler().handle(result)
}

/// `tMPI_Gather`: inverse of [`scatter`] — every member's `sendbuf` becomes one chunk of
/// root's `recvbuf`, ordered by rank.
pub fn gather(
    comm: &Comm,
    sendbuf: &[u8],
    recvbuf: Option<&mut [u8]>,
    count: usize,
    datatype: &Datatype,
    root: i32,
) -> Result<()> {
    let counts = vec![count; comm.size()];
    gatherv(comm, sendbuf, count, recvbuf.map(|b| (b, counts)), datatype, root)
}

/// `tMPI_Gatherv`: as [`gather`], with a possibly different count contributed by each rank;
/// `recv` is `(buffer, counts)`, packed contiguously at root in rank order.
pub fn gatherv(
    comm: &Comm,
    sendbuf: &[u8],
    sendcount: usize,
    recv: Option<(&mut [u8], Vec<usize>)>,
    datatype: &Datatype,
    root: i32,
) -> Result<()> {
    let result = (|| {
        let width = datatype.size_bytes();
        let send_nbytes = sendcount * width;
        if sendbuf.len() < send_nbytes {
            return Err(TmpiError::Buf);
        }
        let rank = my_rank(comm)?;
        let root = root as usize;

        comm.scratch.barrier();
        comm.scratch.publish(rank, Some(PublishedBuf { ptr: sendbuf.as_ptr() as *mut u8, len: send_nbytes }));
        comm.scratch.barrier();

        if rank == root {
            let (buf, counts) = recv.ok_or(TmpiError::Buf)?;
            if counts.len() != comm.size() {
                return Err(TmpiError::MultiMismatch);
            }
            let mut offset = 0usize;
            for (r, &c) in counts.iter().enumerate() {
                let nbytes = c * width;
                let published = comm.scratch.read(r).expect("every member publishes before the closing barrier");
                // SAFETY: every member keeps its `sendbuf` alive and untouched until the
                // trailing barrier below, which it cannot pass until root finishes this loop.
                let src = unsafe { std::slice::from_raw_parts(published.ptr, published.len.min(nbytes)) };
                if offset + src.len() <= buf.len() {
                    buf[offset..offset + src.len()].copy_from_slice(src);
                }
                offset += nbytes;
            }
        }
        // Every member (not just root) must wait here: root is still reading out of each
        // member's `sendbuf` until this point, and a member returning early could mutate or
        // free it while root's loop above is still mid-copy.
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
    fn gather_then_scatter_round_trips() {
        let comm = world_comm(4);
        std::thread::scope(|s| {
            for i in 0u32..4 {
                let comm = &comm;
                s.spawn(move || {
                    crate::worker::bind_current(i);
                    let send = (i as i32).to_ne_bytes();
                    let mut gathered = if i == 0 { vec![0u8; 16] } else { Vec::new() };
                    gather(comm, &send, if i == 0 { Some(&mut gathered) } else { None }, 1, &INT, 0).unwrap();
                    if i == 0 {
                        let values: Vec<i32> = gathered
                            .chunks_exact(4)
                            .map(|c| i32::from_ne_bytes(c.try_into().unwrap()))
                            .collect();
                        assert_eq!(values, vec![0, 1, 2, 3]);
                    }

                    let mut scattered = [0u8; 4];
                    scatter(comm, if i == 0 { Some(&gathered) } else { None }, &mut scattered, 1, &INT, 0).unwrap();
                    assert_eq!(i32::from_ne_bytes(scattered), i as i32);
                });
            }
        });
    }

    #[test]
    fn scatterv_irregular_counts() {
        // 3 workers, counts = [1, 2, 3] ints, packed contiguously: [0][1,2][3,4,5].
        let comm = world_comm(3);
        let counts = [1usize, 2, 3];
        let send_values: [i32; 6] = [0, 1, 2, 3, 4, 5];
        let send_bytes: Vec<u8> = send_values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        std::thread::scope(|s| {
            for i in 0u32..3 {
                let comm = &comm;
                let counts = &counts;
                let send_bytes = &send_bytes;
                s.spawn(move || {
                    crate::worker::bind_current(i);
                    let my_count = counts[i as usize];
                    let mut recv = vec![0u8; my_count * 4];
                    let send = if i == 0 { Some((send_bytes.as_slice(), counts.as_slice())) } else { None };
                    scatterv(comm, send, &mut recv, my_count, &INT, 0).unwrap();
                    let got: Vec<i32> =
                        recv.chunks_exact(4).map(|c| i32::from_ne_bytes(c.try_into().unwrap())).collect();
                    let expected: Vec<i32> = match i {
                        0 => vec![0],
                        1 => vec![1, 2],
                        _ => vec![3, 4, 5],
                    };
                    assert_eq!(got, expected);
                });
            }
        });
    }
}
