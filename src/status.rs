//! User-visible result containers and handles to in-flight operations.

/// Result of a completed point-to-point operation (`tmpi_status_`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Resolved source rank (meaningful for receives; echoes the wildcard resolution).
    pub source: i32,
    /// Resolved tag (meaningful for receives; echoes the wildcard resolution).
    pub tag: i32,
    /// `0` (`SUCCESS`) or one of the codes in [`crate::error::TmpiError::as_code`].
    pub error: i32,
    /// Bytes actually transferred, i.e. `min(send_bytes, recv_capacity)`.
    pub transferred: usize,
}

impl Status {
    pub(crate) fn ok(source: i32, tag: i32, transferred: usize) -> Status {
        Status { source, tag, error: crate::error::SUCCESS, transferred }
    }
}

/// A null status, usable wherever the original interface permits `TMPI_STATUS_IGNORE`.
pub const STATUS_IGNORE: Option<Status> = None;

/// Opaque handle to an in-flight non-blocking operation.
///
/// Owned by the caller until it is passed to [`crate::point_to_point::wait`] or
/// [`crate::point_to_point::test`], at which point the underlying envelope is released back
/// to its issuing worker's pool and this handle is consumed. There is no `Clone`: a request
/// represents unique ownership of one envelope slot, mirroring `tMPI_Request` being an
/// opaque pointer that the original interface never permits you to duplicate.
#[derive(Debug)]
pub struct Request {
    pub(crate) envelope: Option<crate::envelope::EnvelopeHandle>,
    /// The communicator this request was posted against, kept so `wait`/`test` can translate
    /// the matched peer's global worker id back into a rank for the returned [`Status`].
    pub(crate) comm: Option<crate::comm::Comm>,
}

impl Request {
    pub(crate) fn new(envelope: crate::envelope::EnvelopeHandle, comm: crate::comm::Comm) -> Request {
        Request { envelope: Some(envelope), comm: Some(comm) }
    }

    /// A request that refers to no envelope (`TMPI_REQUEST_NULL`).
    pub fn null() -> Request {
        Request { envelope: None, comm: None }
    }

    /// Whether this handle still refers to a live envelope.
    pub fn is_null(&self) -> bool {
        self.envelope.is_none()
    }
}
