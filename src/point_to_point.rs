//! Blocking and non-blocking send/receive (§4.2).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::comm::Comm;
use crate::datatype::Datatype;
use crate::envelope::{Buf, Envelope, Role};
use crate::error::{Result, TmpiError};
use crate::sentinel;
use crate::status::{Request, Status};
use crate::worker;

/// Post a send and wait for it to complete (`tMPI_Send`).
pub fn send(comm: &Comm, buf: &[u8], count: usize, datatype: &Datatype, dest: i32, tag: i32) -> Result<Status> {
    wait(isend(comm, buf, count, datatype, dest, tag)?)
}

/// Post a receive and wait for it to complete (`tMPI_Recv`).
pub fn recv(
    comm: &Comm,
    buf: &mut [u8],
    count: usize,
    datatype: &Datatype,
    source: i32,
    tag: i32,
) -> Result<Status> {
    wait(irecv(comm, buf, count, datatype, source, tag)?)
}

/// Post a send without waiting for completion (`tMPI_Isend`).
pub fn isend(comm: &Comm, buf: &[u8], count: usize, datatype: &Datatype, dest: i32, tag: i32) -> Result<Request> {
    let result = (|| {
        let self_id = worker::current_id()?;
        let dest_id = comm.group().worker_at(dest as usize).ok_or(TmpiError::SendDest)?;
        let table = worker::table()?;
        let dest_worker = table.worker(dest_id).ok_or(TmpiError::SendDest)?;

        let nbytes = count * datatype.size_bytes();
        if buf.len() < nbytes {
            return Err(TmpiError::Buf);
        }

        let envelope = Envelope::new(
            Role::Send,
            self_id,
            Some(dest_id),
            Some(tag),
            comm.isolation,
            *datatype,
            count,
            Buf::External(buf.as_ptr() as *mut u8, nbytes),
            nbytes,
        );
        let issuer = worker::current_worker()?;
        let handle = issuer.pool.alloc(envelope)?;
        dest_worker.mailbox.post_send(Arc::clone(&handle));
        log::trace!("worker {self_id}: isend -> {dest_id} tag {tag} ({nbytes} bytes)");
        Ok(Request::new(handle, Arc::clone(comm)))
    })();
    comm.error_handler().handle(result)
}

/// Post a receive without waiting for completion (`tMPI_Irecv`).
pub fn irecv(
    comm: &Comm,
    buf: &mut [u8],
    count: usize,
    datatype: &Datatype,
    source: i32,
    tag: i32,
) -> Result<Request> {
    let result = (|| {
        let self_id = worker::current_id()?;
        let src_filter = if source == sentinel::ANY_SOURCE {
            None
        } else {
            Some(comm.group().worker_at(source as usize).ok_or(TmpiError::RecvSrc)?)
        };
        let tag_filter = sentinel::tag_filter(tag);

        let nbytes = count * datatype.size_bytes();
        if buf.len() < nbytes {
            return Err(TmpiError::Buf);
        }

        let envelope = Envelope::new(
            Role::Recv,
            self_id,
            src_filter,
            tag_filter,
            comm.isolation,
            *datatype,
            count,
            Buf::External(buf.as_mut_ptr(), nbytes),
            nbytes,
        );
        let issuer = worker::current_worker()?;
        let handle = issuer.pool.alloc(envelope)?;
        issuer.mailbox.post_recv(Arc::clone(&handle));
        log::trace!("worker {self_id}: irecv <- {source} tag {tag} ({nbytes} bytes)");
        Ok(Request::new(handle, Arc::clone(comm)))
    })();
    comm.error_handler().handle(result)
}

/// A non-blocking send paired with a blocking receive, waiting on the send last to avoid the
/// self-deadlock a naive blocking send + blocking receive would risk (§4.2 Sendrecv).
#[allow(clippy::too_many_arguments)]
pub fn sendrecv(
    comm: &Comm,
    send_buf: &[u8],
    send_count: usize,
    send_datatype: &Datatype,
    dest: i32,
    send_tag: i32,
    recv_buf: &mut [u8],
    recv_count: usize,
    recv_datatype: &Datatype,
    source: i32,
    recv_tag: i32,
) -> Result<Status> {
    let send_req = isend(comm, send_buf, send_count, send_datatype, dest, send_tag)?;
    let recv_status = recv(comm, recv_buf, recv_count, recv_datatype, source, recv_tag)?;
    wait(send_req)?;
    Ok(recv_status)
}

/// Block until `req`'s envelope completes, release it, and report its status (`tMPI_Wait`).
pub fn wait(mut req: Request) -> Result<Status> {
    let comm = match req.comm.take() {
        Some(comm) => comm,
        None => return Err(TmpiError::Requests),
    };
    let result = (|| {
        let envelope = req.envelope.take().ok_or(TmpiError::Requests)?;
        let issuer = worker::current_worker()?;
        issuer.mailbox.wait_done(&envelope);
        let status = status_from_envelope(&envelope, &comm);
        issuer.pool.release(envelope);
        Ok(status)
    })();
    comm.error_handler().handle(result)
}

/// Wait for every request in `reqs`, in the order given. Each request may individually
/// complete in any order relative to the others; this only fixes the order in which the
/// caller blocks on them (§4.2 Waitall).
pub fn waitall(reqs: Vec<Request>) -> Result<Vec<Status>> {
    reqs.into_iter().map(wait).collect()
}

/// Non-blocking completion check (`tMPI_Test`). Returns `Ok(None)` if `req` has not yet
/// completed — the request remains live and may be tested or waited on again. A request with
/// no live envelope (already consumed, or [`Request::null`]) is a contract violation and
/// returns `REQUESTS` rather than silently reporting success.
pub fn test(req: &mut Request) -> Result<Option<Status>> {
    let envelope = match req.envelope.as_ref() {
        Some(envelope) => envelope,
        None => return Err(TmpiError::Requests),
    };
    if !envelope.is_done() {
        return Ok(None);
    }
    let comm = req.comm.take().ok_or(TmpiError::Requests)?;
    let result = (|| {
        let envelope = req.envelope.take().unwrap();
        let issuer = worker::current_worker()?;
        let status = status_from_envelope(&envelope, &comm);
        issuer.pool.release(envelope);
        Ok(Some(status))
    })();
    comm.error_handler().handle(result)
}

/// Number of `datatype` elements represented by `status.transferred` bytes (`tMPI_Get_count`).
pub fn get_count(status: &Status, datatype: &Datatype) -> Result<usize> {
    let width = datatype.size_bytes();
    if status.transferred % width != 0 {
        return Err(TmpiError::Status);
    }
    Ok(status.transferred / width)
}

fn status_from_envelope(envelope: &Envelope, comm: &Comm) -> Status {
    let resolved = *envelope.resolved_peer.lock().unwrap();
    let (peer_id, tag) = resolved.unwrap_or((0, 0));
    let source = comm.rank_of(peer_id).map(|r| r as i32).unwrap_or(-1);
    let error = envelope.error.load(Ordering::Relaxed);
    let transferred = envelope.transferred.load(Ordering::Relaxed);
    Status { source, tag, error, transferred }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `isend`/`irecv` route through the issuing and destination workers' `Worker` structs,
    // which only exist behind the process-wide table `lifecycle::init_n` installs — and that
    // table can be installed exactly once per process (§4.5). The ring and buffer-size-mismatch
    // scenarios that need real cross-thread mailbox routing therefore live as integration tests
    // under `tests/`, each its own process; see `tests/scenario_1_ring.rs` and
    // `tests/scenario_5_bufsize_mismatch.rs`. This unit test covers a case that needs neither.
    #[test]
    fn test_on_null_request_is_requests_error() {
        let mut req = Request::null();
        assert_eq!(test(&mut req).unwrap_err(), TmpiError::Requests);
    }
}
