//! Linearization timestamps and their reserved sentinel values.
//!
//! Timestamps are unsigned and monotonic. We reserve the top of the `u64`
//! range for the two sentinels that never denote a real linearization point,
//! leaving `MIN_TS..=MAX_TS` for actual updates — enough headroom that
//! `Clock::next` overflowing it is a programming error, not a realistic
//! long-running condition (see `invariants::debug_assert_clock_not_exhausted`).

/// A linearization or snapshot timestamp.
pub type Timestamp = u64;

/// No announcement / empty RQ slot.
pub const NULL_TS: Timestamp = 0;

/// The first timestamp the clock issues.
pub const MIN_TS: Timestamp = 1;

/// Upper bound used as "no oldest active reader".
pub const MAX_TS: Timestamp = (1u64 << 63) - 2;

/// A bundle entry whose successor is installed but not yet linearized.
pub const PENDING_TS: Timestamp = (1u64 << 63) - 1;

/// True for any timestamp that can legitimately label a finalized entry.
#[inline]
pub const fn is_real(ts: Timestamp) -> bool {
    ts != NULL_TS && ts != PENDING_TS
}
