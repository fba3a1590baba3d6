//! §8 Scenario 4: 3 workers, split with colors [1, 2, 1] and keys [5, 0, 3].

use tmpi_core::{comm, lifecycle, worker};

#[test]
fn split_orders_by_key_then_original_rank() {
    let colors = [1i32, 2, 1];
    let keys = [5i32, 0, 3];

    let guards = lifecycle::init_n(
        3,
        move |_: ()| {
            let world = worker::world().unwrap();
            let mut rank = -1;
            tmpi_core::identity::rank(&world, &mut rank).unwrap();
            let id = worker::current_id().unwrap();

            let new_comm = comm::split(&world, id, colors[rank as usize], keys[rank as usize]).unwrap();
            let new_comm = new_comm.expect("no caller passes UNDEFINED in this scenario");

            (colors[rank as usize], new_comm.group().members().to_vec())
        },
        (),
    )
    .unwrap();

    let results: Vec<(i32, Vec<u32>)> = guards.join().into_iter().map(|r| r.unwrap()).collect();

    let color1: Vec<&Vec<u32>> = results.iter().filter(|(c, _)| *c == 1).map(|(_, m)| m).collect();
    assert_eq!(color1.len(), 2);
    assert!(color1.iter().all(|m| **m == vec![2u32, 0u32]));

    let color2: Vec<&Vec<u32>> = results.iter().filter(|(c, _)| *c == 2).map(|(_, m)| m).collect();
    assert_eq!(color2.len(), 1);
    assert_eq!(*color2[0], vec![1u32]);
}
