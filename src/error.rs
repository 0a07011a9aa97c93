//! Recoverable, host-facing errors.
//!
//! Everything else in this crate that goes wrong is a programming error and
//! aborts via `debug_assert!` (see `invariants.rs`) rather than returning a
//! `Result` — mirroring the teacher crate's split between `ChannelError`
//! (for conditions a caller can reasonably recover from) and its
//! `INV-SEQ-*`/`INV-INIT-*` macros (for conditions that mean a caller already
//! broke the contract).

use thiserror::Error;

/// Errors a host can hit while driving the bundle subsystem.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BrError {
    /// Requested more concurrently-registered range-query processes than the
    /// announcement table was sized for. Raised either by
    /// [`crate::provider::RqProvider::init`] when `num_processes` is `0`, or
    /// by [`crate::provider::RqProvider::init_thread`]/`deinit_thread` when a
    /// host tries to register a process id `>= num_processes`. Recoverable
    /// by raising the process cap passed to `init`.
    #[error("too many range-query processes registered (capacity {max})")]
    TooManyProcesses { max: usize },
}
