//! Debug assertion macros for bundle invariants.
//!
//! These encode the I1–I4 bundle invariants and the protocol-violation
//! conditions from the error-handling design (prepare/finalize pairing,
//! reclaim safety, clock range) as `debug_assert!`s — zero overhead in
//! release builds, same as the teacher crate's `INV-SEQ-*` macros for its
//! ring buffer.

// =============================================================================
// I1: Strictly decreasing non-pending timestamps, newest first.
// =============================================================================

/// Assert a newly finalized entry is strictly newer than the entry below it.
///
/// Used in: `LinkedBundle::finalize`, `CircularBundle::finalize`.
macro_rules! debug_assert_strictly_newer {
    ($new_ts:expr, $older_ts:expr) => {
        debug_assert!(
            $older_ts == crate::timestamp::NULL_TS || $new_ts > $older_ts,
            "I1 violated: finalized ts {} does not exceed next-older ts {}",
            $new_ts,
            $older_ts
        )
    };
}

// =============================================================================
// I2: At most one PENDING_TS entry, and it is the newest.
// =============================================================================

/// Assert a pending entry exists before it is finalized.
///
/// Used in: `LinkedBundle::finalize`, `CircularBundle::finalize`.
macro_rules! debug_assert_pending_exists {
    ($ts:expr) => {
        debug_assert!(
            $ts == crate::timestamp::PENDING_TS,
            "finalize called without a matching pending entry (head ts = {})",
            $ts
        )
    };
}

// =============================================================================
// P6: finalize is not idempotent — calling it twice must be caught.
// =============================================================================

/// Assert `finalize` is not being called twice on the same already-finalized
/// entry (P6). Distinguished from `debug_assert_pending_exists` so the panic
/// message names the double-finalize case instead of "no pending entry".
macro_rules! debug_assert_not_already_finalized {
    ($head_ts:expr, $new_ts:expr) => {
        debug_assert!(
            $head_ts != $new_ts,
            "P6 violated: finalize({}) called twice on the same entry",
            $new_ts
        )
    };
}

// =============================================================================
// I4: A bundle is never empty after initialization.
// =============================================================================

/// Assert reclaim always leaves at least one entry behind.
///
/// Used in: `LinkedBundle::reclaim`, `CircularBundle::reclaim`, after
/// computing the new oldest-kept entry.
macro_rules! debug_assert_bundle_nonempty {
    ($has_entry:expr) => {
        debug_assert!($has_entry, "I4 violated: reclaim would empty the bundle")
    };
}

// =============================================================================
// Reclaim safety: never reclaim an entry already marked reclaimed.
// =============================================================================

/// Assert reclaim does not observe an already-reclaimed entry as live.
///
/// Used in: `LinkedBundle::reclaim`.
macro_rules! debug_assert_not_already_reclaimed {
    ($prior_ts:expr, $marker:expr) => {
        debug_assert!(
            $prior_ts != $marker,
            "reclaim observed an entry already carrying the reclaimed marker (prior_ts = {})",
            $prior_ts
        )
    };
}

// =============================================================================
// Clock range.
// =============================================================================

/// Assert the clock has not exhausted the reserved timestamp range.
///
/// Used in: `Clock::next`.
macro_rules! debug_assert_clock_not_exhausted {
    ($ts:expr) => {
        debug_assert!(
            $ts < crate::timestamp::MAX_TS,
            "clock overflow: reached reserved timestamp range at {}",
            $ts
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_bundle_nonempty;
pub(crate) use debug_assert_clock_not_exhausted;
pub(crate) use debug_assert_not_already_finalized;
pub(crate) use debug_assert_not_already_reclaimed;
pub(crate) use debug_assert_pending_exists;
pub(crate) use debug_assert_strictly_newer;
