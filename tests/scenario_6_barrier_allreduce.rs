//! §8 Scenario 6: 4 workers, concurrent barrier followed by allreduce(MAX) of [i, -i].

use tmpi_core::datatype::INT;
use tmpi_core::op::ReduceOp;
use tmpi_core::{collective, lifecycle, worker};

#[test]
fn barrier_then_allreduce_max_agrees_everywhere() {
    let guards = lifecycle::init_n(
        4,
        |_: ()| {
            let comm = worker::world().unwrap();
            let mut rank = -1;
            tmpi_core::identity::rank(&comm, &mut rank).unwrap();

            collective::barrier(&comm).unwrap();

            let send: Vec<u8> = [rank, -rank].iter().flat_map(|v| v.to_ne_bytes()).collect();
            let mut recv = vec![0u8; 8];
            collective::allreduce(&comm, &send, &mut recv, 2, &INT, ReduceOp::Max).unwrap();
            recv.chunks_exact(4).map(|c| i32::from_ne_bytes(c.try_into().unwrap())).collect::<Vec<i32>>()
        },
        (),
    )
    .unwrap();

    for result in guards.join() {
        assert_eq!(result.unwrap(), vec![3, 0]);
    }
}
