/*! A thread-only, in-process implementation of an MPI-like message-passing core.

A set of cooperating worker threads inside a single address space exchange typed, counted
buffers via rendezvous matching, scoped to communicators; collective operations (barrier,
broadcast, scatter/gather, all-to-all, reduce) are layered on the same primitives. There is no
cross-process transport here — every worker is an OS thread in the calling process, spawned
and joined by [`lifecycle::init_n`].

```
use tmpi_core::{lifecycle, identity, collective};

let guards = lifecycle::init_n(4, |_arg: ()| {
    let comm = tmpi_core::worker::world().unwrap();
    let mut rank = 0;
    identity::rank(&comm, &mut rank).unwrap();
    collective::barrier(&comm).unwrap();
    rank
}, ()).unwrap();
let ranks: Vec<i32> = guards.join().into_iter().map(|r| r.unwrap()).collect();
assert_eq!(ranks.len(), 4);
```
*/

pub mod collective;
pub mod comm;
pub mod config;
pub mod datatype;
mod envelope;
pub mod error;
pub mod group;
pub mod identity;
pub mod lifecycle;
mod mailbox;
pub mod op;
mod pool;
pub mod point_to_point;
pub mod sentinel;
pub mod status;
pub mod worker;

pub use error::{Result, TmpiError};
pub use sentinel::{ANY_SOURCE, ANY_TAG, UNDEFINED};
pub use status::{Request, Status, STATUS_IGNORE};
