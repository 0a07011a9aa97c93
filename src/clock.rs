//! The global linearization clock (C3).
//!
//! A single atomic counter shared by every update. `RqProvider` reserves a
//! timestamp for each linearizing write via `fetch_add`; optional
//! timestamp relaxation lets a thread reuse the same reservation across
//! several updates before touching the shared cache line again, trading
//! timestamp precision (how many writes can share one observable instant)
//! for less contention on the counter itself.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::invariants::debug_assert_clock_not_exhausted;
use crate::timestamp::{Timestamp, MIN_TS};

/// The shared linearization-timestamp counter.
///
/// Starts at `MIN_TS - 1` so the first `next()` call returns `MIN_TS`,
/// matching the original's `curr_timestamp_` initialized to `0` with
/// `BUNDLE_MIN_TIMESTAMP == 1`.
#[derive(Debug)]
pub struct Clock {
    curr: AtomicU64,
}

impl Clock {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            curr: AtomicU64::new(MIN_TS - 1),
        }
    }

    /// Reserves and returns the next linearization timestamp.
    ///
    /// This is the `fetch_add` at the heart of the two-phase protocol: the
    /// timestamp is reserved *before* the host's linearizing store executes,
    /// so any reader that observes a value concurrently finalized at this
    /// timestamp is guaranteed to also observe everything ordered before it.
    #[inline]
    pub fn next(&self) -> Timestamp {
        let ts = self.curr.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert_clock_not_exhausted!(ts);
        ts
    }

    /// Reads the current timestamp without advancing it. Used by
    /// diagnostics and by the relaxation path to decide whether a batch of
    /// reservations is still fresh.
    #[inline]
    #[must_use]
    pub fn load(&self) -> Timestamp {
        self.curr.load(Ordering::Acquire)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-thread timestamp relaxation state.
///
/// When `relaxation > 1`, a thread reserves a block of `relaxation`
/// timestamps from the shared `Clock` in one `fetch_add` and hands out the
/// individual values from `local_timestamp` on subsequent calls, cutting
/// contention on the shared counter at the cost of coarser timestamps
/// (several updates from the same thread may share one reserved value).
/// Mirrors `rq_thread_data_[tid].data.local_timestamp` in
/// `original_source/bundle/circular_bundle.h`.
#[derive(Debug)]
pub struct Relaxation {
    /// Configured block size; `1` disables relaxation.
    factor: u32,
    /// Timestamps remaining in the current reserved block.
    remaining: u32,
    /// Next timestamp to hand out from the current block.
    local_timestamp: Timestamp,
}

impl Relaxation {
    #[must_use]
    pub const fn new(factor: u32) -> Self {
        Self {
            factor: if factor == 0 { 1 } else { factor },
            remaining: 0,
            local_timestamp: MIN_TS,
        }
    }

    /// Returns the next timestamp to use for a linearizing update,
    /// reserving a fresh block from `clock` when the current one is spent.
    pub fn next(&mut self, clock: &Clock) -> Timestamp {
        if self.factor <= 1 {
            return clock.next();
        }
        if self.remaining == 0 {
            let base = clock.curr.fetch_add(u64::from(self.factor), Ordering::AcqRel) + 1;
            debug_assert_clock_not_exhausted!(base + u64::from(self.factor) - 1);
            self.local_timestamp = base;
            self.remaining = self.factor;
        }
        let ts = self.local_timestamp;
        self.local_timestamp += 1;
        self.remaining -= 1;
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_timestamp_is_min_ts() {
        let clock = Clock::new();
        assert_eq!(clock.next(), MIN_TS);
    }

    #[test]
    fn timestamps_are_monotone() {
        let clock = Clock::new();
        let mut prev = clock.next();
        for _ in 0..1000 {
            let ts = clock.next();
            assert!(ts > prev);
            prev = ts;
        }
    }

    #[test]
    fn relaxation_disabled_matches_clock_directly() {
        let clock = Clock::new();
        let mut r = Relaxation::new(1);
        for _ in 0..10 {
            assert_eq!(r.next(&clock), clock.load());
        }
    }

    #[test]
    fn relaxation_batches_reservations() {
        let clock = Clock::new();
        let mut r = Relaxation::new(4);
        let a = r.next(&clock);
        let b = r.next(&clock);
        let c = r.next(&clock);
        let d = r.next(&clock);
        assert_eq!([a, b, c, d], [1, 2, 3, 4]);
        // Clock only advanced once for the whole block.
        assert_eq!(clock.load(), 4);
        let e = r.next(&clock);
        assert_eq!(e, 5);
        assert_eq!(clock.load(), 8);
    }
}
