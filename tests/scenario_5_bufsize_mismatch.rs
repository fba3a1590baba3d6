//! §8 Scenario 5: 2 workers, isend + irecv + waitall with a buffer size mismatch.

use tmpi_core::datatype::BYTE;
use tmpi_core::error::SUCCESS;
use tmpi_core::{lifecycle, point_to_point as p2p, worker, TmpiError};

#[test]
fn bufsize_mismatch_reports_error_without_deadlock() {
    let guards = lifecycle::init_n(
        2,
        |_: ()| {
            let comm = worker::world().unwrap();
            let mut rank = -1;
            tmpi_core::identity::rank(&comm, &mut rank).unwrap();

            if rank == 0 {
                let payload: Vec<u8> = (0..16u8).collect();
                let req = p2p::isend(&comm, &payload, 16, &BYTE, 1, 7).unwrap();
                p2p::waitall(vec![req]).unwrap().remove(0)
            } else {
                let mut buf = [0u8; 8];
                let req = p2p::irecv(&comm, &mut buf, 8, &BYTE, 0, 7).unwrap();
                p2p::waitall(vec![req]).unwrap().remove(0)
            }
        },
        (),
    )
    .unwrap();

    let results = guards.join();
    let send_status = results[0].as_ref().unwrap();
    let recv_status = results[1].as_ref().unwrap();

    assert_eq!(send_status.error, SUCCESS);
    assert_eq!(recv_status.error, TmpiError::XferBufsize.as_code());
    assert_eq!(recv_status.transferred, 8);
}
