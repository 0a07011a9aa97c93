//! The RQ announcement table (C2).
//!
//! One padded slot per process, publishing the linearization timestamp of
//! its currently-active range query (if any) so `oldest_active()` can be
//! computed without a lock. Modeled on `__rq_thread_data` in
//! `original_source/bundle/circular_bundle.h`, and on the cache-line-padded
//! per-producer slot layout the teacher crate uses for its `Ring<T>` head/tail
//! cursors — here via `crossbeam_utils::CachePadded` rather than a hand-rolled
//! wrapper, since this crate actually needs the dependency the teacher only
//! declared.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::backoff::Backoff;
use crate::clock::{Clock, Relaxation};
use crate::error::BrError;
use crate::timestamp::{Timestamp, MAX_TS, NULL_TS};

/// A single process's announcement slot.
///
/// `rq_flag` is raised before the clock is read and `rq_lin_time` is
/// written, and lowered again once `rq_lin_time` is stable — it marks the
/// brief window during which the `(clock, rq_lin_time)` pair is being
/// assembled, not whether the slot is "active". A concurrent
/// `oldest_active` scan spins on `rq_flag` rather than trusting
/// `rq_lin_time` mid-publish, matching `start_traversal`'s pseudocode in
/// spec.md §4.2 and `original_source/bundle/rq_bundle.h`'s equivalent
/// `anns_[tid].rq_flag`/`rq_lin_time` pair.
struct Slot {
    rq_lin_time: AtomicU64,
    rq_flag: AtomicBool,
    relaxation: std::cell::UnsafeCell<Relaxation>,
}

// Safety: `relaxation` is only ever touched by the owning process's own
// thread (single-writer), the same discipline the teacher crate documents
// for its `UnsafeCell` ring fields. Sharing the table across threads is
// otherwise safe because every other field is atomic.
unsafe impl Sync for Slot {}

impl Slot {
    fn new(relaxation_factor: u32) -> Self {
        Self {
            rq_lin_time: AtomicU64::new(NULL_TS),
            rq_flag: AtomicBool::new(false),
            relaxation: std::cell::UnsafeCell::new(Relaxation::new(relaxation_factor)),
        }
    }
}

/// The shared table of per-process RQ announcements.
pub struct AnnouncementTable {
    slots: Box<[CachePadded<Slot>]>,
}

impl AnnouncementTable {
    /// Builds a table sized for up to `num_processes` concurrently
    /// registered processes.
    ///
    /// # Errors
    ///
    /// Returns [`BrError::TooManyProcesses`] if `num_processes` is `0` — the
    /// one recoverable misuse a host can correct by raising its process cap,
    /// per `spec.md` §7 / `SPEC_FULL.md` §6.1.
    pub fn new(num_processes: usize, relaxation_factor: u32) -> Result<Self, BrError> {
        if num_processes == 0 {
            return Err(BrError::TooManyProcesses {
                max: num_processes,
            });
        }
        let slots = (0..num_processes)
            .map(|_| CachePadded::new(Slot::new(relaxation_factor)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self { slots })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Resets process `pid`'s slot, the one place a host registers or
    /// retires a process id.
    ///
    /// # Errors
    ///
    /// Returns [`BrError::TooManyProcesses`] if `pid >= capacity()` — a host
    /// registering more concurrent processes than `num_processes` allows at
    /// [`Self::new`], recoverable by raising that cap, per `spec.md` §7 /
    /// `SPEC_FULL.md` §6.1. Every other method on this table assumes `pid`
    /// was already validated this way and panics on an out-of-range `pid`,
    /// since at that point it is a host bug rather than a fresh
    /// registration request.
    pub fn reset_slot(&self, pid: usize) -> Result<(), BrError> {
        if pid >= self.capacity() {
            return Err(BrError::TooManyProcesses {
                max: self.capacity(),
            });
        }
        self.slots[pid].rq_lin_time.store(NULL_TS, Ordering::Release);
        Ok(())
    }

    /// Announces process `pid` as starting a range query, returning the
    /// snapshot timestamp it captured.
    ///
    /// Follows spec.md §4.2's publication order exactly: raise `rq_flag`,
    /// *then* read `clock`, *then* publish `rq_lin_time`, *then* lower
    /// `rq_flag`. Reading the clock only after the flag is raised, and
    /// lowering the flag only after `rq_lin_time` is visible, is what lets
    /// `oldest_active` spin on the flag instead of ever observing a slot
    /// that looks inactive while a snapshot timestamp is in flight.
    ///
    /// # Panics
    ///
    /// Panics if `pid >= capacity()` — an out-of-range process id is the
    /// host's bug, not a recoverable condition.
    pub fn start_traversal(&self, pid: usize, clock: &Clock) -> Timestamp {
        let slot = &self.slots[pid];
        slot.rq_flag.store(true, Ordering::Release);
        let ts = clock.load();
        slot.rq_lin_time.store(ts, Ordering::Release);
        slot.rq_flag.store(false, Ordering::Release);
        ts
    }

    /// Ends process `pid`'s currently-announced range query.
    ///
    /// # Panics
    ///
    /// Panics if `pid >= capacity()`.
    pub fn end_traversal(&self, pid: usize) {
        self.slots[pid].rq_lin_time.store(NULL_TS, Ordering::Release);
    }

    /// Returns this process's relaxed next timestamp, advancing its local
    /// reservation block against `clock` as needed.
    ///
    /// # Safety
    ///
    /// The caller must be the single thread that owns process `pid` — no
    /// two threads may call this for the same `pid` concurrently, matching
    /// the single-writer discipline of the underlying `Relaxation`.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn relaxation_mut(&self, pid: usize) -> &mut Relaxation {
        &mut *self.slots[pid].relaxation.get()
    }

    /// Computes the timestamp of the oldest still-active range query, or
    /// `MAX_TS` if none are active.
    ///
    /// Spins on each slot's `rq_flag` first, exactly per spec.md §4.2's
    /// `oldest_active` pseudocode — a slot caught mid-`start_traversal`
    /// (flag raised, clock read, `rq_lin_time` not yet published) is waited
    /// out rather than treated as absent, so this never computes a cutoff
    /// newer than a reader that is in the middle of announcing itself.
    #[must_use]
    pub fn oldest_active(&self) -> Timestamp {
        let mut oldest = MAX_TS;
        for slot in &*self.slots {
            let mut backoff = Backoff::new();
            while slot.rq_flag.load(Ordering::Acquire) {
                backoff.spin();
            }
            let ts = slot.rq_lin_time.load(Ordering::Acquire);
            if ts != NULL_TS && ts < oldest {
                oldest = ts;
            }
        }
        oldest
    }
}
