//! §8 Scenario 2: 8 workers, bcast of an 8-element integer array from root 3.

use tmpi_core::datatype::INT;
use tmpi_core::{collective, lifecycle, worker};

const VALUES: [i32; 8] = [10, 20, 30, 40, 50, 60, 70, 80];

#[test]
fn bcast_delivers_roots_array_to_everyone() {
    let guards = lifecycle::init_n(
        8,
        |_: ()| {
            let comm = worker::world().unwrap();
            let mut rank = -1;
            tmpi_core::identity::rank(&comm, &mut rank).unwrap();

            let mut bytes = if rank == 3 {
                VALUES.iter().flat_map(|v| v.to_ne_bytes()).collect::<Vec<u8>>()
            } else {
                vec![0u8; VALUES.len() * 4]
            };
            collective::bcast(&comm, &mut bytes, VALUES.len(), &INT, 3).unwrap();
            bytes.chunks_exact(4).map(|c| i32::from_ne_bytes(c.try_into().unwrap())).collect::<Vec<i32>>()
        },
        (),
    )
    .unwrap();

    for result in guards.join() {
        assert_eq!(result.unwrap(), VALUES.to_vec());
    }
}
