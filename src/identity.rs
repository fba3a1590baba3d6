//! A caller's rank/size/group within a communicator (§6 Identity).

use crate::comm::Comm;
use crate::error::Result;
use crate::group::Group;
use crate::worker;

/// The calling thread's rank in `comm` (`tMPI_Comm_rank`).
pub fn rank(comm: &Comm, rank: &mut i32) -> Result<()> {
    let id = worker::current_id()?;
    *rank = comm.rank_of(id)? as i32;
    Ok(())
}

/// The number of members of `comm` (`tMPI_Comm_size`).
pub fn size(comm: &Comm, size: &mut i32) -> Result<()> {
    *size = comm.size() as i32;
    Ok(())
}

/// The group underlying `comm` (`tMPI_Comm_group`).
pub fn group_of(comm: &Comm) -> Group {
    std::sync::Arc::clone(comm.group())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::world_comm;

    #[test]
    fn rank_and_size_report_position() {
        let comm = world_comm(3);
        std::thread::scope(|s| {
            for id in 0..3u32 {
                let comm = &comm;
                s.spawn(move || {
                    crate::worker::bind_current(id);
                    let mut r = -1;
                    rank(comm, &mut r).unwrap();
                    assert_eq!(r, id as i32);
                    let mut sz = 0;
                    size(comm, &mut sz).unwrap();
                    assert_eq!(sz, 3);
                })
                .join()
                .unwrap();
            }
        });
    }
}
