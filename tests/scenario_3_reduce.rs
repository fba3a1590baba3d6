//! §8 Scenario 3: 4 workers, reduce(SUM, root=0) on 3-element arrays.

use tmpi_core::datatype::INT;
use tmpi_core::op::ReduceOp;
use tmpi_core::{collective, lifecycle, worker};

#[test]
fn reduce_sum_accumulates_at_root_only() {
    let guards = lifecycle::init_n(
        4,
        |_: ()| {
            let comm = worker::world().unwrap();
            let mut rank = -1;
            tmpi_core::identity::rank(&comm, &mut rank).unwrap();

            let contribution = [rank, rank * 2, rank * 3];
            let send: Vec<u8> = contribution.iter().flat_map(|v| v.to_ne_bytes()).collect();
            let mut recv = vec![0u8; 12];

            collective::reduce(
                &comm,
                &send,
                if rank == 0 { Some(&mut recv) } else { None },
                3,
                &INT,
                ReduceOp::Sum,
                0,
            )
            .unwrap();

            if rank == 0 {
                Some(recv.chunks_exact(4).map(|c| i32::from_ne_bytes(c.try_into().unwrap())).collect::<Vec<i32>>())
            } else {
                None
            }
        },
        (),
    )
    .unwrap();

    let results = guards.join();
    let root_result = results[0].as_ref().unwrap().clone().unwrap();
    assert_eq!(root_result, vec![6, 12, 18]);
    for other in &results[1..] {
        assert!(other.as_ref().unwrap().is_none(), "non-root worker must not produce a result");
    }
}
