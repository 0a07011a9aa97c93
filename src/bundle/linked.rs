//! The linked bundle representation: a CAS-swung singly linked list of
//! entries, newest first, terminated by a sentinel that is always present
//! (I4). Grounded directly in `original_source/bundle/linked_bundle.h`.

use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};

use crate::backoff::Backoff;
use crate::entry::NodeRef;
use crate::invariants::{
    debug_assert_bundle_nonempty, debug_assert_not_already_finalized,
    debug_assert_not_already_reclaimed, debug_assert_pending_exists, debug_assert_strictly_newer,
};
use crate::timestamp::{Timestamp, MAX_TS, NULL_TS, PENDING_TS};

/// Internal tombstone written over a reclaimed entry's timestamp, purely so
/// a debug build can catch a double-reclaim. Distinct from every timestamp
/// sentinel a live entry can legitimately carry (`NULL_TS` included, since
/// the initial sentinel entry is itself reclaimable once a newer entry
/// dominates every active reader).
const RECLAIMED_MARK: Timestamp = Timestamp::MAX;

struct Entry<N> {
    ts: AtomicU64,
    succ: NodeRef<N>,
    next: AtomicPtr<Entry<N>>,
}

impl<N> Entry<N> {
    fn boxed(ts: Timestamp, succ: NodeRef<N>, next: *mut Entry<N>) -> *mut Entry<N> {
        Box::into_raw(Box::new(Entry {
            ts: AtomicU64::new(ts),
            succ,
            next: AtomicPtr::new(next),
        }))
    }
}

pub struct LinkedBundle<N> {
    head: AtomicPtr<Entry<N>>,
    deferred_free: bool,
    retired: std::cell::UnsafeCell<Vec<*mut Entry<N>>>,
}

// Safety: `retired` is only mutated from `reclaim`, which the provider
// guarantees is never called concurrently for the same bundle (either a
// single inline caller, or a single background sweeper thread) — the same
// single-writer discipline the teacher crate documents for its `UnsafeCell`
// ring cursors.
unsafe impl<N: Send> Sync for LinkedBundle<N> {}

impl<N> LinkedBundle<N> {
    /// Builds a bundle whose single initial entry points at `initial_succ`,
    /// satisfying I4 (never empty) from construction.
    #[must_use]
    pub fn new(initial_succ: NodeRef<N>) -> Self {
        let sentinel = Entry::boxed(NULL_TS, initial_succ, std::ptr::null_mut());
        Self {
            head: AtomicPtr::new(sentinel),
            deferred_free: false,
            retired: std::cell::UnsafeCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_deferred_free(initial_succ: NodeRef<N>, deferred_free: bool) -> Self {
        let mut b = Self::new(initial_succ);
        b.deferred_free = deferred_free;
        b
    }

    /// Installs a new pending entry at the head of the bundle.
    ///
    /// Returns once the CAS wins; `finalize` must be called exactly once
    /// afterwards with the reserved linearization timestamp before any
    /// further `prepare`.
    pub fn prepare(&self, succ: NodeRef<N>) {
        let mut backoff = Backoff::new();
        loop {
            let old_head = self.head.load(Ordering::Acquire);
            let new_entry = Entry::boxed(PENDING_TS, succ, old_head);
            // Release: publish the fully-initialized entry (including its
            // `next` link) before any thread can observe it via `head`.
            match self.head.compare_exchange_weak(
                old_head,
                new_entry,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(_) => {
                    // SAFETY: never published, no other thread has seen it.
                    unsafe {
                        drop(Box::from_raw(new_entry));
                    }
                    backoff.spin();
                }
            }
        }
    }

    /// Publishes the reserved linearization timestamp on the entry most
    /// recently installed by `prepare`.
    pub fn finalize(&self, ts: Timestamp) {
        let head = self.head.load(Ordering::Acquire);
        // SAFETY: head is always a live entry (I4); never freed while
        // reachable from `head` (reclaim only cuts the tail past a
        // dominating entry, never the head itself mid-prepare/finalize).
        let entry = unsafe { &*head };
        let old_ts = entry.ts.load(Ordering::Relaxed);
        debug_assert_not_already_finalized!(old_ts, ts);
        debug_assert_pending_exists!(old_ts);
        let next = entry.next.load(Ordering::Relaxed);
        if !next.is_null() {
            let older_ts = unsafe { (*next).ts.load(Ordering::Relaxed) };
            debug_assert_strictly_newer!(ts, older_ts);
        }
        entry.ts.store(ts, Ordering::Release);
    }

    /// Returns the successor reference dominated by `ts`: the newest
    /// finalized entry whose timestamp is `<= ts`.
    ///
    /// Spins while the entry under examination is pending — its real
    /// timestamp, once known, might still dominate `ts`, so a reader cannot
    /// skip past it without waiting (the crux of the P2/P3 linearizability
    /// protocol).
    #[must_use]
    pub fn lookup(&self, ts: Timestamp) -> NodeRef<N> {
        let mut curr = self.head.load(Ordering::Acquire);
        let mut backoff = Backoff::new();
        loop {
            // SAFETY: every entry reachable from `head` stays live until
            // reclaimed, and reclaim never frees an entry a reader at `ts`
            // could still need (I3, argued via `oldest_active`).
            let entry = unsafe { &*curr };
            let entry_ts = entry.ts.load(Ordering::Acquire);
            if entry_ts == PENDING_TS {
                backoff.spin();
                continue;
            }
            if entry_ts <= ts {
                return entry.succ;
            }
            let next = entry.next.load(Ordering::Acquire);
            debug_assert!(!next.is_null(), "walked off the end without a dominating entry");
            curr = next;
            backoff.reset();
        }
    }

    /// Unlinks and retires every entry older than the newest entry that
    /// still dominates `oldest_active`, leaving the bundle non-empty (I4).
    ///
    /// Per spec.md §4.1, `oldest_active == NULL_TS` means no reader is
    /// active at all: reclaim everything down to just the newest entry,
    /// regardless of its timestamp.
    pub fn reclaim(&self, oldest_active: Timestamp) {
        let head = self.head.load(Ordering::Acquire);
        if oldest_active == NULL_TS {
            let boundary = unsafe { &*head };
            let dangling = boundary.next.swap(std::ptr::null_mut(), Ordering::AcqRel);
            if dangling.is_null() {
                return;
            }
            self.retire_chain(dangling);
            return;
        }
        let mut curr = head;
        loop {
            // SAFETY: see `lookup`.
            let entry = unsafe { &*curr };
            let ts = entry.ts.load(Ordering::Acquire);
            if ts == PENDING_TS || ts > oldest_active {
                let next = entry.next.load(Ordering::Acquire);
                if next.is_null() {
                    debug_assert_bundle_nonempty!(true);
                    return;
                }
                curr = next;
                continue;
            }
            break;
        }
        let boundary = unsafe { &*curr };
        let dangling = boundary.next.swap(std::ptr::null_mut(), Ordering::AcqRel);
        if dangling.is_null() {
            return;
        }
        self.retire_chain(dangling);
    }

    fn retire_chain(&self, mut node: *mut Entry<N>) {
        // SAFETY: single-writer into `retired`, see the `Sync` impl above.
        let retired = unsafe { &mut *self.retired.get() };
        for ptr in retired.drain(..) {
            unsafe {
                drop(Box::from_raw(ptr));
            }
        }
        while !node.is_null() {
            let prior_ts = unsafe { (*node).ts.swap(RECLAIMED_MARK, Ordering::AcqRel) };
            debug_assert_not_already_reclaimed!(prior_ts, RECLAIMED_MARK);
            let next = unsafe { (*node).next.load(Ordering::Acquire) };
            if self.deferred_free {
                retired.push(node);
            } else {
                unsafe {
                    drop(Box::from_raw(node));
                }
            }
            node = next;
        }
    }

    /// Best-effort, non-linearizable count of live entries — for
    /// diagnostics only, per `original_source/bundle/linked_bundle.h`'s
    /// `size()`.
    #[must_use]
    pub fn size(&self) -> usize {
        let mut n = 0;
        let mut curr = self.head.load(Ordering::Acquire);
        while !curr.is_null() {
            n += 1;
            curr = unsafe { (*curr).next.load(Ordering::Acquire) };
        }
        n
    }
}

impl<N> Drop for LinkedBundle<N> {
    fn drop(&mut self) {
        let retired = unsafe { &mut *self.retired.get() };
        for ptr in retired.drain(..) {
            unsafe {
                drop(Box::from_raw(ptr));
            }
        }
        let mut curr = *self.head.get_mut();
        while !curr.is_null() {
            let next = unsafe { *(*curr).next.get_mut() };
            unsafe {
                drop(Box::from_raw(curr));
            }
            curr = next;
        }
    }
}
