//! Communicator: group + isolation context + collective scratch (§3, §4.3, §4.4).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex};

use crate::error::ErrorHandler;
use crate::group::{Group, GroupInner};

/// Process-wide monotonic counter handing out fresh isolation contexts (§4.3).
static NEXT_ISOLATION: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_isolation() -> u64 {
    NEXT_ISOLATION.fetch_add(1, Ordering::Relaxed)
}

/// A raw pointer/length pair published into a communicator's collective scratch. Safety
/// rests on the same rendezvous discipline as [`crate::envelope::Buf`]: a publisher does not
/// touch the pointee again until every reader has observed the round's closing barrier.
#[derive(Clone, Copy)]
pub(crate) struct PublishedBuf {
    pub ptr: *mut u8,
    pub len: usize,
}

unsafe impl Send for PublishedBuf {}
unsafe impl Sync for PublishedBuf {}

struct SenseBarrier {
    state: Mutex<(usize, bool)>,
    cond: Condvar,
}

impl SenseBarrier {
    fn new() -> SenseBarrier {
        SenseBarrier { state: Mutex::new((0, false)), cond: Condvar::new() }
    }

    /// Block until `total` callers have called this. Two-phase (even/odd) sense reversal:
    /// the last arrival flips the phase and wakes everyone else, so a new barrier call can't
    /// be mistaken for the previous one's wakeup (§4.4 Barrier).
    fn wait(&self, total: usize) {
        let mut state = self.state.lock();
        let my_phase = state.1;
        state.0 += 1;
        if state.0 == total {
            state.0 = 0;
            state.1 = !state.1;
            self.cond.notify_all();
        } else {
            while state.1 == my_phase {
                self.cond.wait(&mut state);
            }
        }
    }
}

/// Per-communicator collective scratch region (§3 Communicator, §4.4).
///
/// A "round" is: an entry barrier, (optional) publish into one's own slot, a closing barrier
/// so every publish is visible before anyone reads, then reads by whoever needs them. No
/// explicit clear is needed: a slot is only ever republished or read by the thread that owns
/// it, and the next round's entry barrier cannot complete until every reader of this round —
/// including the slowest — has already reached that barrier, so stale data can never be
/// observed by a *later collective*. That guarantee says nothing about the caller's own
/// send/recv buffers, though: those are borrowed for the duration of the round, and a
/// publisher must not return (letting its caller reuse or free the buffer) until every reader
/// is done copying out of it. Collectives that publish a pointer into a caller buffer
/// therefore add one more barrier of their own, after the reads, before any participant
/// returns — see `collective::bcast`/`scatter_gather`/`alltoall` for the pattern.
pub(crate) struct CommScratch {
    size: usize,
    barrier: SenseBarrier,
    slots: Mutex<Vec<Option<PublishedBuf>>>,
    /// A second, parallel set of per-rank slots for metadata that rides alongside a round's
    /// main publish (e.g. a `counts` array a `*v` collective needs to derive per-destination
    /// displacements) — same lifetime and barrier discipline as `slots`.
    aux_slots: Mutex<Vec<Option<PublishedBuf>>>,
    /// Padded off the barrier/slots state above: every collective call bumps this on the
    /// uncontended fast path after the barrier has already released everyone.
    generation: CachePadded<AtomicU64>,
}

impl CommScratch {
    fn new(size: usize) -> CommScratch {
        CommScratch {
            size,
            barrier: SenseBarrier::new(),
            slots: Mutex::new(vec![None; size]),
            aux_slots: Mutex::new(vec![None; size]),
            generation: CachePadded::new(AtomicU64::new(0)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Enter the communicator's barrier and advance the generation stamp once the whole
    /// group has arrived (§4.4, §5 "generation stamp uses acquire/release semantics").
    pub fn barrier(&self) {
        self.barrier.wait(self.size);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn publish(&self, rank: usize, buf: Option<PublishedBuf>) {
        self.slots.lock()[rank] = buf;
    }

    pub fn read(&self, rank: usize) -> Option<PublishedBuf> {
        self.slots.lock()[rank]
    }

    pub fn publish_aux(&self, rank: usize, buf: Option<PublishedBuf>) {
        self.aux_slots.lock()[rank] = buf;
    }

    pub fn read_aux(&self, rank: usize) -> Option<PublishedBuf> {
        self.aux_slots.lock()[rank]
    }
}

/// `tMPI_Comm`: a group, an isolation context, and collective scratch sized to the group.
pub struct CommInner {
    pub(crate) group: Group,
    pub(crate) isolation: u64,
    pub(crate) scratch: CommScratch,
    pub(crate) error_handler: Mutex<ErrorHandler>,
    /// Monotonic id distinguishing communicators for debugging/logging; not part of the
    /// matching protocol (that's `isolation`).
    pub(crate) id: u64,

    /// Handoff slot for `create`/`dup` (§4.3): the elected member of the new group writes
    /// here between the two construction barriers.
    construct_new: Mutex<Option<Comm>>,
    /// Handoff slots for `split` (§4.3), indexed by the caller's rank in `self`: each
    /// caller's own (color, key, global id) contribution, then (after the collector
    /// computes groupings) each caller's resulting communicator.
    split_contrib: Mutex<Vec<Option<(i32, i32, u32)>>>,
    split_result: Mutex<Vec<Option<Comm>>>,
}

pub type Comm = Arc<CommInner>;

static NEXT_COMM_ID: AtomicUsize = AtomicUsize::new(1);

impl CommInner {
    pub(crate) fn from_group(group: Group) -> Comm {
        let size = group.size();
        let id = NEXT_COMM_ID.fetch_add(1, Ordering::Relaxed) as u64;
        log::debug!("comm {id}: constructed with {size} members, isolation context assigned");
        Arc::new(CommInner {
            group,
            isolation: next_isolation(),
            scratch: CommScratch::new(size),
            error_handler: Mutex::new(ErrorHandler::Return),
            id,
            construct_new: Mutex::new(None),
            split_contrib: Mutex::new(vec![None; size]),
            split_result: Mutex::new(vec![None; size]),
        })
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn size(&self) -> usize {
        self.group.size()
    }

    pub fn rank_of(&self, worker: u32) -> Result<usize, crate::error::TmpiError> {
        self.group.rank_of(worker)
    }

    pub fn set_error_handler(&self, handler: ErrorHandler) {
        *self.error_handler.lock() = handler;
    }

    pub fn error_handler(&self) -> ErrorHandler {
        *self.error_handler.lock()
    }
}

impl std::fmt::Debug for CommInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comm")
            .field("id", &self.id)
            .field("size", &self.size())
            .field("isolation", &self.isolation)
            .finish()
    }
}

/// Build the world communicator: all workers, rank order == global id order.
pub(crate) fn world_comm(n: usize) -> Comm {
    let group = GroupInner::new((0..n as u32).collect());
    CommInner::from_group(group)
}

/// `tMPI_Comm_create` (§4.3): every worker in `from` calls this. Callers inside `group`
/// receive the new communicator; callers outside it receive `None` (`TMPI_COMM_NULL`).
///
/// Protocol: barrier, so no caller can observe a stale `construct_new` slot from a previous
/// round; the lowest-ranked member of `group` builds and publishes the new communicator;
/// a second barrier makes that publish visible to everyone before they read it. No
/// subsequent barrier or explicit clear is needed: the next call to `create`/`dup` on `from`
/// has its own entry barrier, which cannot complete until every caller here — including
/// whoever is slowest to read — has already returned from this call.
pub fn create(from: &Comm, self_id: u32, group: &Group) -> Result<Option<Comm>, crate::error::TmpiError> {
    let result = (|| {
        from.rank_of(self_id)?;
        from.scratch.barrier();
        if group.rank_of(self_id) == Ok(0) {
            let new_comm = CommInner::from_group(Arc::clone(group));
            log::debug!("comm {}: create -> comm {}", from.id, new_comm.id);
            *from.construct_new.lock() = Some(new_comm);
        }
        from.scratch.barrier();
        let slot = from.construct_new.lock().clone();
        Ok(if group.rank_of(self_id).is_ok() { slot } else { None })
    })();
    from.error_handler().handle(result)
}

/// `tMPI_Comm_dup` (§4.3): as [`create`] but with the same group and a fresh isolation
/// context, so messages posted on the duplicate can never match those on the original.
pub fn dup(from: &Comm, self_id: u32) -> Result<Comm, crate::error::TmpiError> {
    let group = Arc::clone(&from.group);
    let result = create(from, self_id, &group)?;
    Ok(result.expect("every caller is a member of its own communicator's group"))
}

/// `tMPI_Comm_split` (§4.3): every caller in `from` contributes `(color, key)`. Rank 0 of
/// `from` groups the contributions by color (color `UNDEFINED` maps to `None`), orders each
/// color group by `(key ascending, original rank in from ascending)`, and publishes one new
/// communicator per color group. Every caller reads back the communicator for its own color.
pub fn split(
    from: &Comm,
    self_id: u32,
    color: i32,
    key: i32,
) -> Result<Option<Comm>, crate::error::TmpiError> {
    use crate::sentinel::UNDEFINED;

    let result = (|| {
        let my_rank = from.rank_of(self_id)?;

        from.scratch.barrier();
        from.split_contrib.lock()[my_rank] = Some((color, key, self_id));
        from.scratch.barrier();

        if my_rank == 0 {
            let contributions: Vec<(usize, i32, i32, u32)> = from
                .split_contrib
                .lock()
                .iter()
                .enumerate()
                .map(|(rank, c)| {
                    let (color, key, id) = c.expect("every member of `from` must call split");
                    (rank, color, key, id)
                })
                .collect();

            let mut by_color: std::collections::BTreeMap<i32, Vec<(usize, i32, u32)>> =
                std::collections::BTreeMap::new();
            for (rank, color, key, id) in contributions {
                if color == UNDEFINED {
                    continue;
                }
                by_color.entry(color).or_default().push((rank, key, id));
            }

            let mut results: Vec<Option<Comm>> = vec![None; from.size()];
            for (color, mut members) in by_color {
                members.sort_by_key(|&(rank, key, _)| (key, rank));
                let ids: Vec<u32> = members.iter().map(|&(_, _, id)| id).collect();
                let new_comm = CommInner::from_group(GroupInner::new(ids));
                log::debug!(
                    "comm {}: split color {} -> comm {} ({} members)",
                    from.id,
                    color,
                    new_comm.id,
                    new_comm.size()
                );
                for (rank, _, _) in members {
                    results[rank] = Some(Arc::clone(&new_comm));
                }
            }
            *from.split_result.lock() = results;
        }
        from.scratch.barrier();

        Ok(from.split_result.lock()[my_rank].clone())
    })();
    from.error_handler().handle(result)
}

/// `tMPI_Comm_free`: release a handle. `Comm` is reference-counted, so this is just a drop —
/// kept as a named function so the public surface matches §6 exactly.
pub fn free(_comm: Comm) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_comm_ranks_match_ids() {
        let comm = world_comm(4);
        for i in 0..4u32 {
            assert_eq!(comm.rank_of(i).unwrap(), i as usize);
        }
    }

    #[test]
    fn distinct_comms_get_distinct_isolation() {
        let a = world_comm(2);
        let b = world_comm(2);
        assert_ne!(a.isolation, b.isolation);
    }

    #[test]
    fn split_scenario_from_spec() {
        // 3 workers, colors [1, 2, 1], keys [5, 0, 3] (§8 Scenario 4).
        let from = world_comm(3);
        let inputs = [(0u32, 1i32, 5i32), (1, 2, 0), (2, 1, 3)];
        let results: Vec<_> = std::thread::scope(|s| {
            inputs
                .iter()
                .map(|&(id, color, key)| {
                    let from = &from;
                    s.spawn(move || split(from, id, color, key).unwrap())
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect()
        });

        let color1_worker2 = results[2].as_ref().unwrap();
        let color1_worker0 = results[0].as_ref().unwrap();
        assert!(Arc::ptr_eq(color1_worker2, color1_worker0));
        assert_eq!(color1_worker2.group().members(), &[2, 0]);

        let color2_worker1 = results[1].as_ref().unwrap();
        assert_eq!(color2_worker1.group().members(), &[1]);
    }
}
