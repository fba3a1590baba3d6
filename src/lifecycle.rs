//! Process-wide lifecycle: `init`, `finalize`, `abort`, and per-thread bootstrap (§4.5).
//!
//! Spawns one named `thread::Builder` OS thread per worker, runs the caller's closure on
//! each, and hands the caller back a joinable guard type. One deliberate departure from the
//! original C interface (§9 decision, see `DESIGN.md`): the original binds the *calling*
//! thread as worker 0 and has the rest re-enter `main`, a trick that only works because it
//! fully owns the process's `main`. A Rust library cannot re-enter its caller's `main`, so
//! every worker — including rank 0 — runs as a freshly spawned thread, and the original
//! caller's role becomes purely that of the joining/orchestrating thread (it still performs
//! the teardown in §4.5's "worker 0 joins them, tears down... clears initialized").

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::comm::Comm;
use crate::config::Config;
use crate::error::TmpiError;
use crate::worker;

static TEARDOWN_DONE: AtomicBool = AtomicBool::new(false);

/// Create `n` workers, each running `func(arg.clone())` on its own OS thread, and bind the
/// world communicator (`tMPI_Init_fn`).
pub fn init_n<A, T, F>(n: usize, func: F, arg: A) -> Result<WorkerGuards<T>, TmpiError>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> T + Send + Sync + 'static,
{
    if n == 0 {
        return Err(TmpiError::Init);
    }
    worker::install(n)?;
    TEARDOWN_DONE.store(false, Ordering::Release);

    let func = std::sync::Arc::new(func);
    let mut guards = Vec::with_capacity(n);
    for id in 0..n as u32 {
        let func = std::sync::Arc::clone(&func);
        let arg = arg.clone();
        let handle = thread::Builder::new()
            .name(format!("tmpi-worker-{id}"))
            .spawn(move || {
                worker::bind_current(id);
                log::debug!("worker {id}: started");
                let result = func(arg);
                log::debug!("worker {id}: closure returned");
                result
            })
            .map_err(|e| {
                log::error!("failed to spawn worker {id}: {e}");
                TmpiError::Init
            })?;
        guards.push(handle);
    }

    Ok(WorkerGuards { guards })
}

/// Derive the worker count from `argv` (falling back to `TMPI_NP`/1) and initialize
/// (`tMPI_Init` — see the module doc for why this takes an explicit closure/arg rather than
/// re-entering `main`).
#[cfg(feature = "getopts")]
pub fn init_with_args<A, T, F, I>(args: I, func: F, arg: A) -> Result<WorkerGuards<T>, TmpiError>
where
    A: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> T + Send + Sync + 'static,
    I: Iterator<Item = String>,
{
    let n = get_n_from_args(args)?;
    init_n(n, func, arg)
}

/// Parse just the worker count out of `argv` (`tMPI_Get_N`), without initializing.
#[cfg(feature = "getopts")]
pub fn get_n_from_args<I: Iterator<Item = String>>(args: I) -> Result<usize, TmpiError> {
    Config::from_args(args).map(|c| c.n_workers).map_err(|_| TmpiError::Init)
}

/// Synchronize on the world communicator and mark this worker as having reached finalize
/// (`tMPI_Finalize`). The actual teardown of communicators/pools/flags happens once every
/// worker thread has been joined — see [`WorkerGuards::join`].
pub fn finalize() -> Result<(), TmpiError> {
    let table = worker::table()?;
    table.world().scratch.barrier();
    Ok(())
}

/// Best-effort, uncoordinated process termination (`tMPI_Abort`). Never returns.
pub fn abort(_comm: &Comm, code: i32) -> ! {
    log::error!("abort requested with code {code}");
    std::process::exit(code);
}

/// `tMPI_Initialized`.
pub fn initialized(flag: &mut bool) -> Result<(), TmpiError> {
    *flag = worker::is_initialized();
    Ok(())
}

/// `tMPI_Finalized`.
pub fn finalized(flag: &mut bool) -> Result<(), TmpiError> {
    *flag = worker::is_finalized();
    Ok(())
}

fn teardown_once() {
    if TEARDOWN_DONE
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        worker::teardown();
    }
}

/// Join handles for every spawned worker thread.
pub struct WorkerGuards<T: Send + 'static> {
    guards: Vec<thread::JoinHandle<T>>,
}

impl<T: Send + 'static> WorkerGuards<T> {
    pub fn guards(&self) -> &[thread::JoinHandle<T>] {
        &self.guards
    }

    /// Wait for every worker thread to finish and tear down process-wide lifecycle state.
    pub fn join(mut self) -> Vec<Result<T, String>> {
        let results = self.guards.drain(..).map(|g| g.join().map_err(|e| format!("{e:?}"))).collect();
        teardown_once();
        results
    }
}

impl<T: Send + 'static> Drop for WorkerGuards<T> {
    fn drop(&mut self) {
        for guard in self.guards.drain(..) {
            guard.join().expect("worker thread panicked");
        }
        teardown_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_n_runs_every_worker() {
        let guards = init_n(
            4,
            |_: ()| {
                let comm = worker::world().unwrap();
                let mut rank = -1;
                crate::identity::rank(&comm, &mut rank).unwrap();
                rank
            },
            (),
        )
        .unwrap();
        let mut ranks: Vec<i32> = guards.join().into_iter().map(|r| r.unwrap()).collect();
        ranks.sort();
        assert_eq!(ranks, vec![0, 1, 2, 3]);

        let mut flag = false;
        finalized(&mut flag).unwrap();
        assert!(flag);
    }
}
