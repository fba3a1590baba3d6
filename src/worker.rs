//! The process-wide worker table: a fixed array of worker descriptors, published read-only
//! after init (§2 Worker Table, §5 Shared state).

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::comm::{self, Comm};
use crate::error::TmpiError;
use crate::mailbox::Mailbox;
use crate::pool::EnvelopePool;

/// One worker's private state: identity, mailbox, envelope pool.
///
/// `COMM_SELF` (a one-member communicator containing only this worker) is built lazily the
/// first time it's asked for, not eagerly for every worker at init, since most programs
/// never use it.
pub struct Worker {
    pub id: u32,
    pub mailbox: Mailbox,
    pub pool: EnvelopePool,
    self_comm: OnceLock<Comm>,
}

impl Worker {
    fn new(id: u32) -> Worker {
        Worker {
            id,
            mailbox: Mailbox::new(),
            pool: EnvelopePool::default(),
            self_comm: OnceLock::new(),
        }
    }

    /// `TMPI_COMM_SELF` for this worker: a private one-member communicator.
    pub fn comm_self(&self) -> &Comm {
        self.self_comm.get_or_init(|| {
            comm::CommInner::from_group(crate::group::GroupInner::new(vec![self.id]))
        })
    }
}

/// The process-wide table plus the world communicator, published once at init.
pub struct WorkerTable {
    workers: Vec<Arc<Worker>>,
    world: Comm,
}

impl WorkerTable {
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn worker(&self, id: u32) -> Option<&Arc<Worker>> {
        self.workers.get(id as usize)
    }

    pub fn world(&self) -> &Comm {
        &self.world
    }
}

static TABLE: OnceLock<WorkerTable> = OnceLock::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);
static FINALIZED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static MY_ID: Cell<Option<u32>> = const { Cell::new(None) };
}

/// Called once, by the thread driving `init_n`, before any worker threads are spawned.
pub(crate) fn install(n: usize) -> Result<&'static WorkerTable, TmpiError> {
    if INITIALIZED.load(Ordering::Acquire) {
        return Err(TmpiError::Init);
    }
    let workers = (0..n as u32).map(|id| Arc::new(Worker::new(id))).collect();
    let world = comm::world_comm(n);
    let table = WorkerTable { workers, world };
    TABLE.set(table).map_err(|_| TmpiError::Init)?;
    // Release: everything above (the table's contents) must be visible to any thread that
    // subsequently observes `INITIALIZED == true` (§5 "published read-only after init").
    INITIALIZED.store(true, Ordering::Release);
    Ok(TABLE.get().unwrap())
}

pub(crate) fn teardown() {
    INITIALIZED.store(false, Ordering::Release);
    FINALIZED.store(true, Ordering::Release);
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

pub fn is_finalized() -> bool {
    FINALIZED.load(Ordering::Acquire)
}

pub(crate) fn table() -> Result<&'static WorkerTable, TmpiError> {
    if !is_initialized() {
        return Err(TmpiError::Init);
    }
    TABLE.get().ok_or(TmpiError::Init)
}

/// The world communicator (`TMPI_COMM_WORLD`): every worker, in rank order.
pub fn world() -> Result<Comm, TmpiError> {
    Ok(table()?.world().clone())
}

/// Bind the calling OS thread to a worker id. Called exactly once, by each worker thread,
/// immediately after it starts (§4.5).
pub(crate) fn bind_current(id: u32) {
    MY_ID.with(|cell| cell.set(Some(id)));
}

/// The calling thread's worker id, if it's bound to one.
pub fn current_id() -> Result<u32, TmpiError> {
    MY_ID.with(|cell| cell.get()).ok_or(TmpiError::Init)
}

pub(crate) fn current_worker() -> Result<Arc<Worker>, TmpiError> {
    let id = current_id()?;
    Ok(Arc::clone(table()?.worker(id).expect("bound id must be in range")))
}
