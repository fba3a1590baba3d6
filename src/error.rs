//! Error codes.
//!
//! The numeric ordering here matches the `enum` in `thread_mpi/tmpi.h`: `SUCCESS` is folded
//! into `Ok(())` everywhere in this crate, and every other member becomes a variant of
//! [`TmpiError`] in the same order it appears in the header.

use thiserror::Error;

/// Everything that can go wrong in a call into this crate.
///
/// Every fallible entry point returns `Result<T, TmpiError>`. [`TmpiError::as_code`]
/// recovers the public integer sentinel from §6, for callers that bridge to a C-shaped ABI
/// or just want to compare against a well-known constant.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmpiError {
    #[error("out of memory")]
    Malloc,
    #[error("initialization error")]
    Init,
    #[error("finalize error")]
    Finalize,
    #[error("invalid group")]
    Group,
    #[error("invalid communicator")]
    Comm,
    #[error("invalid status")]
    Status,
    #[error("rank not present in group")]
    GroupRank,
    #[error("invalid dimensions")]
    Dims,
    #[error("invalid coordinates")]
    Coords,
    #[error("Cartesian communicator process count mismatch")]
    CartCreateNprocs,
    #[error("transfer has no counterpart")]
    XferCounterpart,
    #[error("receive buffer too small for the matched send")]
    XferBufsize,
    #[error("send and receive buffers overlap")]
    XferBufOverlap,
    #[error("destination rank out of range")]
    SendDest,
    #[error("source rank out of range")]
    RecvSrc,
    #[error("invalid buffer")]
    Buf,
    #[error("count or datatype mismatch across collective participants")]
    MultiMismatch,
    #[error("operator not valid for this datatype")]
    OpFn,
    #[error("envelope pool exhausted")]
    Envelopes,
    #[error("request table exhausted")]
    Requests,
    #[error("unspecified failure")]
    Failure,
    #[error("unknown error")]
    Unknown,
}

impl TmpiError {
    /// Project back to the public integer sentinel from §6 (`SUCCESS = 0`, this crate's
    /// `Ok(())` never materializes a `TmpiError` so the smallest code this can return is 1).
    pub fn as_code(self) -> i32 {
        use TmpiError::*;
        match self {
            Malloc => 1,
            Init => 2,
            Finalize => 3,
            Group => 4,
            Comm => 5,
            Status => 6,
            GroupRank => 7,
            Dims => 8,
            Coords => 9,
            CartCreateNprocs => 10,
            XferCounterpart => 11,
            XferBufsize => 12,
            XferBufOverlap => 13,
            SendDest => 14,
            RecvSrc => 15,
            Buf => 16,
            MultiMismatch => 17,
            OpFn => 18,
            Envelopes => 19,
            Requests => 20,
            Failure => 21,
            Unknown => 22,
        }
    }
}

/// The `SUCCESS` sentinel from §6; `Result::Ok` always corresponds to this.
pub const SUCCESS: i32 = 0;

/// Convenience alias used across the crate's public surface.
pub type Result<T> = std::result::Result<T, TmpiError>;

/// The error-handler policy attached to a communicator (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorHandler {
    /// Abort the process on any non-success return.
    Fatal,
    /// Propagate the error code to the caller.
    Return,
}

impl ErrorHandler {
    /// Apply this policy to a result just produced by some operation on `comm`.
    ///
    /// Under `Fatal`, this never returns `Err`: it logs and aborts the process instead.
    pub(crate) fn handle<T>(self, result: Result<T>) -> Result<T> {
        if let (ErrorHandler::Fatal, Err(e)) = (self, &result) {
            log::error!("fatal error handler invoked: {e} (code {})", e.as_code());
            std::process::abort();
        }
        result
    }
}
