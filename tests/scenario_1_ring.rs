//! §8 Scenario 1: 4 workers, ring send-recv.

use tmpi_core::datatype::INT;
use tmpi_core::{lifecycle, point_to_point as p2p, worker};

#[test]
fn ring_send_recv_reports_expected_source_and_value() {
    let guards = lifecycle::init_n(
        4,
        |_: ()| {
            let comm = worker::world().unwrap();
            let mut rank = -1;
            tmpi_core::identity::rank(&comm, &mut rank).unwrap();
            let rank = rank as u32;

            let next = (rank + 1) % 4;
            let prev = (rank + 3) % 4;

            let send_val = (rank as i32).to_ne_bytes();
            let mut recv_val = [0u8; 4];
            let status = p2p::sendrecv(
                &comm,
                &send_val,
                1,
                &INT,
                next as i32,
                0,
                &mut recv_val,
                1,
                &INT,
                prev as i32,
                0,
            )
            .unwrap();

            (status.source, i32::from_ne_bytes(recv_val))
        },
        (),
    )
    .unwrap();

    let results: Vec<(i32, i32)> = guards.join().into_iter().map(|r| r.unwrap()).collect();
    for (rank, (source, value)) in results.into_iter().enumerate() {
        let prev = ((rank + 3) % 4) as i32;
        assert_eq!(source, prev, "worker {rank}'s status source");
        assert_eq!(value, prev, "worker {rank}'s received value");
    }
}
