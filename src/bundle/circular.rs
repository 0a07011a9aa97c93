//! The circular bundle representation: an array of entries addressed by
//! monotonically increasing `base`/`curr` logical indices modulo capacity,
//! doubling in place when full. Grounded in
//! `original_source/bundle/circular_bundle.h`, including its modulo
//! indexing (`% capacity_`) rather than a power-of-two bitmask, so the
//! spec-mandated default `initial_capacity` of 5 (not a power of two) is a
//! valid capacity, exactly as `BUNDLE_INIT_CAPACITY 5` is in the source.
//! Two deliberate deviations from that source remain (see `SPEC_FULL.md`
//! §4.1 and `DESIGN.md`): `prepare` is single-shot, and `grow` relocates
//! live entries into a canonical `[0, len)` prefix instead of the
//! original's unwrapped-index copy.
//!
//! Unlike the linked representation, reclaiming here never frees memory —
//! it only advances `base` past entries no active reader can need (I3);
//! the slots themselves are recycled by later `prepare` calls once `base`
//! has moved past them. Only `grow` allocates, and only `grow` ever retires
//! an old array, using the same one-grace-generation deferral as
//! `LinkedBundle`'s entry retirement.
//!
//! This trades the original's `PENDING | RESIZE | RECLAIM | RQ` state word
//! for two independent flags (`pending`, `reclaiming`): `grow` only ever
//! runs from inside `prepare`, which already excludes concurrent preparers,
//! so a separate resize flag buys nothing here.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicUsize, Ordering};

use crate::backoff::Backoff;
use crate::entry::NodeRef;
use crate::invariants::{
    debug_assert_bundle_nonempty, debug_assert_not_already_finalized, debug_assert_pending_exists,
    debug_assert_strictly_newer,
};
use crate::timestamp::{Timestamp, MAX_TS, NULL_TS, PENDING_TS};

struct RawEntry<N> {
    ts: AtomicU64,
    succ: UnsafeCell<NodeRef<N>>,
}

impl<N> RawEntry<N> {
    fn empty() -> Self {
        Self {
            ts: AtomicU64::new(NULL_TS),
            succ: UnsafeCell::new(NodeRef::null()),
        }
    }
}

// Safety: `succ` is written only while the writer holds `pending`, and read
// only after the corresponding `ts` has been observed non-pending with
// Acquire — the same release/acquire pairing `LinkedBundle` uses for its
// entries.
unsafe impl<N: Send> Sync for RawEntry<N> {}

struct Array<N> {
    entries: Box<[RawEntry<N>]>,
    base: AtomicUsize,
    curr: AtomicUsize,
}

impl<N> Array<N> {
    fn with_capacity(capacity: usize) -> Self {
        let entries = (0..capacity)
            .map(|_| RawEntry::empty())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            entries,
            base: AtomicUsize::new(0),
            curr: AtomicUsize::new(0),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct CircularBundle<N> {
    array: AtomicPtr<Array<N>>,
    pending: AtomicBool,
    reclaiming: AtomicBool,
    retired: UnsafeCell<Vec<Box<Array<N>>>>,
}

// Safety: `retired` is only touched from `grow`, which only ever runs while
// `pending` is held by the calling thread — single-writer, same discipline
// as `LinkedBundle::retired`.
unsafe impl<N: Send> Sync for CircularBundle<N> {}

impl<N> CircularBundle<N> {
    /// Builds a bundle with `initial_capacity` slots (any nonzero value —
    /// [`crate::config::Config::new`] only requires nonzero, matching the
    /// original's `% capacity_` indexing, which has no power-of-two
    /// requirement), whose single initial entry points at `initial_succ`.
    #[must_use]
    pub fn new(initial_capacity: usize, initial_succ: NodeRef<N>) -> Self {
        debug_assert!(initial_capacity > 0, "circular bundle capacity must be nonzero");
        let array = Array::with_capacity(initial_capacity);
        unsafe {
            *array.entries[0].succ.get() = initial_succ;
        }
        array.entries[0].ts.store(NULL_TS, Ordering::Release);
        Self {
            array: AtomicPtr::new(Box::into_raw(Box::new(array))),
            pending: AtomicBool::new(false),
            reclaiming: AtomicBool::new(false),
            retired: UnsafeCell::new(Vec::new()),
        }
    }

    fn acquire_pending(&self) {
        let mut backoff = Backoff::new();
        while self
            .pending
            .compare_exchange_weak(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            backoff.spin();
        }
    }

    /// Appends a new pending entry, growing the array first if it is full.
    ///
    /// Single-shot: unlike the original C++ source, this never loops past
    /// the first successful append — the `pending` flag already excludes
    /// every other would-be preparer, so a retry loop here would only ever
    /// spin on itself.
    pub fn prepare(&self, succ: NodeRef<N>) {
        self.acquire_pending();
        let mut arr_ptr = self.array.load(Ordering::Acquire);
        // SAFETY: `arr_ptr` was published with Release by `new`/`grow` and
        // is only ever retired after `pending` is released, which we hold.
        let mut arr = unsafe { &*arr_ptr };
        let base = arr.base.load(Ordering::Relaxed);
        let mut curr = arr.curr.load(Ordering::Relaxed);
        if curr + 1 - base >= arr.entries.len() {
            // `grow` resets numbering to base = 0, so post-grow `curr`
            // must be re-read in the new array's own index space rather
            // than reused from the pre-grow array.
            arr_ptr = self.grow(arr_ptr);
            arr = unsafe { &*arr_ptr };
            curr = arr.curr.load(Ordering::Relaxed);
        }
        let new_curr = curr + 1;
        let idx = new_curr % arr.len();
        unsafe {
            *arr.entries[idx].succ.get() = succ;
        }
        arr.entries[idx].ts.store(PENDING_TS, Ordering::Release);
        arr.curr.store(new_curr, Ordering::Release);
    }

    /// Doubles capacity, relocating every entry in `[base, curr]` into the
    /// canonical prefix `[0, len)` of the new array (`base = 0`, `curr =
    /// len - 1`), then retires the old array after one grace generation.
    fn grow(&self, old_ptr: *mut Array<N>) -> *mut Array<N> {
        // SAFETY: caller holds `pending`.
        let old = unsafe { &*old_ptr };
        let old_len = old.len();
        let base = old.base.load(Ordering::Relaxed);
        let curr = old.curr.load(Ordering::Relaxed);
        let new_cap = old.entries.len() * 2;
        let new_arr = Array::with_capacity(new_cap);
        let mut i = 0usize;
        for logical in base..=curr {
            let src = &old.entries[logical % old_len];
            new_arr.entries[i]
                .ts
                .store(src.ts.load(Ordering::Relaxed), Ordering::Relaxed);
            unsafe {
                *new_arr.entries[i].succ.get() = *src.succ.get();
            }
            i += 1;
        }
        new_arr.base.store(0, Ordering::Relaxed);
        new_arr.curr.store(i - 1, Ordering::Relaxed);
        let new_ptr = Box::into_raw(Box::new(new_arr));
        self.array.store(new_ptr, Ordering::Release);
        self.retire(old_ptr);
        new_ptr
    }

    fn retire(&self, old_ptr: *mut Array<N>) {
        // SAFETY: single-writer, see the `Sync` impl above.
        let retired = unsafe { &mut *self.retired.get() };
        for ptr in retired.drain(..) {
            drop(ptr);
        }
        // SAFETY: `old_ptr` was allocated by `Box::into_raw` in `new`/`grow`.
        retired.push(unsafe { Box::from_raw(old_ptr) });
    }

    /// Publishes the reserved linearization timestamp on the entry most
    /// recently installed by `prepare`.
    pub fn finalize(&self, ts: Timestamp) {
        let arr_ptr = self.array.load(Ordering::Acquire);
        // SAFETY: no grow can have run since our matching `prepare` started
        // (both require holding `pending`, which we still hold).
        let arr = unsafe { &*arr_ptr };
        let len = arr.len();
        let curr = arr.curr.load(Ordering::Relaxed);
        let idx = curr % len;
        let old_ts = arr.entries[idx].ts.load(Ordering::Relaxed);
        debug_assert_not_already_finalized!(old_ts, ts);
        debug_assert_pending_exists!(old_ts);
        let base = arr.base.load(Ordering::Relaxed);
        if curr > base {
            let older_ts = arr.entries[(curr - 1) % len].ts.load(Ordering::Relaxed);
            debug_assert_strictly_newer!(ts, older_ts);
        }
        arr.entries[idx].ts.store(ts, Ordering::Release);
        self.pending.store(false, Ordering::Release);
    }

    /// Returns the successor reference dominated by `ts`.
    #[must_use]
    pub fn lookup(&self, ts: Timestamp) -> NodeRef<N> {
        let mut backoff = Backoff::new();
        'outer: loop {
            let arr_ptr = self.array.load(Ordering::Acquire);
            // SAFETY: readers never retire the array; grow only retires
            // after publishing the replacement, so `arr_ptr` stays valid
            // for at least one more grace generation past this load.
            let arr = unsafe { &*arr_ptr };
            let len = arr.len();
            let base = arr.base.load(Ordering::Acquire);
            let mut i = arr.curr.load(Ordering::Acquire);
            loop {
                let idx = i % len;
                let entry_ts = arr.entries[idx].ts.load(Ordering::Acquire);
                if entry_ts == PENDING_TS {
                    if self.array.load(Ordering::Acquire) != arr_ptr {
                        continue 'outer;
                    }
                    backoff.spin();
                    continue;
                }
                if entry_ts <= ts {
                    return unsafe { *arr.entries[idx].succ.get() };
                }
                if i == base {
                    // The bottom entry must dominate every real ts (I4 plus
                    // the NULL_TS sentinel never being above any query);
                    // reaching here regardless means return it anyway.
                    return unsafe { *arr.entries[idx].succ.get() };
                }
                i -= 1;
                backoff.reset();
            }
        }
    }

    /// Advances `base` past every entry older than the newest entry that
    /// still dominates `oldest_active`, without freeing anything — the
    /// slots are simply eligible for reuse by future `prepare` calls.
    ///
    /// Per spec.md §4.1, `oldest_active == NULL_TS` means no reader is
    /// active at all: reclaim everything down to just the newest entry,
    /// regardless of its timestamp.
    pub fn reclaim(&self, oldest_active: Timestamp) {
        let mut backoff = Backoff::new();
        while self
            .reclaiming
            .compare_exchange_weak(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            backoff.spin();
        }
        let arr_ptr = self.array.load(Ordering::Acquire);
        let arr = unsafe { &*arr_ptr };
        let len = arr.len();
        let base = arr.base.load(Ordering::Relaxed);
        let curr = arr.curr.load(Ordering::Relaxed);
        let boundary = if oldest_active == NULL_TS {
            curr
        } else {
            let mut boundary = base;
            let mut i = base;
            while i <= curr {
                let ts = arr.entries[i % len].ts.load(Ordering::Acquire);
                if ts == PENDING_TS || ts > oldest_active {
                    break;
                }
                boundary = i;
                i += 1;
            }
            boundary
        };
        debug_assert_bundle_nonempty!(boundary <= curr);
        if boundary > base {
            arr.base.store(boundary, Ordering::Release);
        }
        self.reclaiming.store(false, Ordering::Release);
    }

    /// Best-effort, non-linearizable live-entry count.
    #[must_use]
    pub fn size(&self) -> usize {
        let arr_ptr = self.array.load(Ordering::Acquire);
        let arr = unsafe { &*arr_ptr };
        arr.curr.load(Ordering::Acquire) - arr.base.load(Ordering::Acquire) + 1
    }
}

impl<N> Drop for CircularBundle<N> {
    fn drop(&mut self) {
        let retired = unsafe { &mut *self.retired.get() };
        retired.clear();
        let arr_ptr = *self.array.get_mut();
        unsafe {
            drop(Box::from_raw(arr_ptr));
        }
    }
}
