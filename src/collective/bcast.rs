//! Broadcast (§4.4 Broadcast).

use crate::comm::{Comm, PublishedBuf};
use crate::datatype::Datatype;
use crate::error::{Result, TmpiError};

use super::my_rank;

/// `tMPI_Bcast`: copy `root`'s buffer into every other member's buffer.
pub fn bcast(comm: &Comm, buf: &mut [u8], count: usize, datatype: &Datatype, root: i32) -> Result<()> {
    let result = (|| {
        let nbytes = count * datatype.size_bytes();
        if buf.len() < nbytes {
            return Err(TmpiError::Buf);
        }
        let rank = my_rank(comm)?;
        let root = root as usize;

        comm.scratch.barrier();
        if rank == root {
            comm.scratch.publish(root, Some(PublishedBuf { ptr: buf.as_mut_ptr(), len: nbytes }));
        }
        comm.scratch.barrier();

        if rank != root {
            let published = comm.scratch.read(root).expect("root must publish before the closing barrier");
            // SAFETY: root keeps `buf` alive and untouched until the trailing barrier below,
            // which it cannot pass until every reader has finished this copy.
            let src = unsafe { std::slice::from_raw_parts(published.ptr, published.len.min(nbytes)) };
            buf[..src.len()].copy_from_slice(src);
        }
        // Root must not return (and so must not let its caller reuse `buf`) until every
        // reader above has finished copying out of it.
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
    fn bcast_8_workers_from_root_3() {
        // Scenario 2 (§8).
        let values: [i32; 8] = [10, 20, 30, 40, 50, 60, 70, 80];
        let comm = world_comm(8);
        std::thread::scope(|s| {
            for i in 0u32..8 {
                let comm = &comm;
                s.spawn(move || {
                    crate::worker::bind_current(i);
                    let mut bytes = if i == 3 {
                        values.iter().flat_map(|v| v.to_ne_bytes()).collect::<Vec<u8>>()
                    } else {
                        vec![0u8; 8 * 4]
                    };
                    bcast(comm, &mut bytes, 8, &INT, 3).unwrap();
                    let got: Vec<i32> =
                        bytes.chunks_exact(4).map(|c| i32::from_ne_bytes(c.try_into().unwrap())).collect();
                    assert_eq!(got, values);
                });
            }
        });
    }
}
