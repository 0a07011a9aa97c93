//! A minimal fine-grained-locking lazy list used only to drive
//! `bundle_rq`'s external contract end to end in the integration tests.
//!
//! Not a production host — just enough of `doInsert`/`erase`/`rangeQuery`
//! from `bundle_lazylist_impl.h` to exercise prepare/linearize/finalize and
//! `with_traversal` against a real (if toy) ordered set. Node memory is
//! leaked rather than reclaimed: SMR is explicitly out of scope for
//! `bundle_rq`, and a test harness has no business inventing one.

#![allow(dead_code)]

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use bundle_rq::{BundleHandle, BundledNode, Config, NodeRef, RqProvider};

pub struct Node {
    pub key: u64,
    pub value: u64,
    next: AtomicPtr<Node>,
    marked: AtomicBool,
    lock: AtomicBool,
    bundle: BundleHandle<Node>,
}

impl BundledNode<Node> for Node {
    fn bundle(&self) -> &BundleHandle<Node> {
        &self.bundle
    }
}

impl Node {
    fn new(key: u64, value: u64, next: *mut Node, config: &Config) -> *mut Node {
        let succ = NodeRef::new(next as *const Node);
        Box::into_raw(Box::new(Node {
            key,
            value,
            next: AtomicPtr::new(next),
            marked: AtomicBool::new(false),
            lock: AtomicBool::new(false),
            bundle: BundleHandle::new(config, succ),
        }))
    }

    fn lock(&self) {
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }
}

/// A sentinel-headed, sentinel-tailed lazy list keyed by `u64`, with one
/// bundle per node recording its successor's history.
pub struct LazyList {
    head: *mut Node,
    provider: RqProvider<Node>,
}

// Safety: every mutation goes through per-node spin locks (insert/erase) or
// the provider's own synchronization (traversals); nodes are never freed.
unsafe impl Send for LazyList {}
unsafe impl Sync for LazyList {}

impl LazyList {
    pub fn new(config: Config, num_processes: usize) -> Self {
        let tail = Node::new(u64::MAX, 0, ptr::null_mut(), &config);
        let head = Node::new(0, 0, tail, &config);
        let provider = RqProvider::init(num_processes, config).unwrap();
        Self { head, provider }
    }

    /// Locates `pred`/`curr` such that `pred.key < key <= curr.key`
    /// (unlocked, best-effort — caller re-validates after locking).
    fn find(&self, key: u64) -> (*mut Node, *mut Node) {
        let mut pred = self.head;
        let mut curr = unsafe { (*pred).next.load(Ordering::Acquire) };
        while unsafe { (*curr).key } < key {
            pred = curr;
            curr = unsafe { (*curr).next.load(Ordering::Acquire) };
        }
        (pred, curr)
    }

    fn validate(pred: *mut Node, curr: *mut Node) -> bool {
        unsafe {
            !(*pred).marked.load(Ordering::Acquire)
                && !(*curr).marked.load(Ordering::Acquire)
                && (*pred).next.load(Ordering::Acquire) == curr
        }
    }

    /// Inserts `key` -> `value`, linearized through the bundle subsystem.
    /// Returns `false` if `key` was already present.
    pub fn insert(&self, pid: usize, key: u64, value: u64) -> bool {
        loop {
            let (pred, curr) = self.find(key);
            unsafe { (*pred).lock() };
            if !Self::validate(pred, curr) {
                unsafe { (*pred).unlock() };
                continue;
            }
            if unsafe { (*curr).key } == key {
                unsafe { (*pred).unlock() };
                return false;
            }
            let new_node = Node::new(key, value, curr, self.provider.config());
            let new_succ = NodeRef::new(new_node as *const Node);
            let pred_bundle = unsafe { (*pred).bundle() };

            self.provider.prepare_bundles(&[pred_bundle], &[new_succ]);
            let ts = self.provider.linearize_update(pid);
            unsafe { (*pred).next.store(new_node, Ordering::Release) };
            self.provider.finalize_bundles(&[pred_bundle], ts);

            unsafe { (*pred).unlock() };
            return true;
        }
    }

    /// Logically and then physically removes `key`, linearized through the
    /// bundle subsystem. Returns `false` if `key` was absent.
    pub fn erase(&self, pid: usize, key: u64) -> bool {
        loop {
            let (pred, curr) = self.find(key);
            if unsafe { (*curr).key } != key {
                return false;
            }
            unsafe { (*pred).lock() };
            unsafe { (*curr).lock() };
            if !Self::validate(pred, curr) {
                unsafe { (*curr).unlock() };
                unsafe { (*pred).unlock() };
                continue;
            }
            unsafe { (*curr).marked.store(true, Ordering::Release) };
            let succ = unsafe { (*curr).next.load(Ordering::Acquire) };
            let new_succ = NodeRef::new(succ as *const Node);
            let pred_bundle = unsafe { (*pred).bundle() };

            self.provider.prepare_bundles(&[pred_bundle], &[new_succ]);
            let ts = self.provider.linearize_update(pid);
            unsafe { (*pred).next.store(succ, Ordering::Release) };
            self.provider.finalize_bundles(&[pred_bundle], ts);

            self.provider
                .physical_deletion_succeeded(&[NodeRef::new(curr as *const Node)], |_| {});

            unsafe { (*curr).unlock() };
            unsafe { (*pred).unlock() };
            return true;
        }
    }

    /// Returns every key in `[lo, hi]` as of a single linearization point,
    /// by walking bundles instead of the live list.
    pub fn range_query(&self, pid: usize, lo: u64, hi: u64) -> Vec<(u64, u64)> {
        bundle_rq::with_traversal(&self.provider, pid, |ts| Some(self.snapshot_at(ts, lo, hi)))
    }

    /// The bundle walk `range_query` performs, factored out so a test can
    /// hold a traversal open (announce, do other work, walk, withdraw)
    /// instead of going through `with_traversal`'s synchronous
    /// announce-attempt-withdraw cycle.
    pub fn snapshot_at(&self, ts: bundle_rq::Timestamp, lo: u64, hi: u64) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        let mut curr = unsafe { (*self.head).bundle().lookup(ts) };
        while !curr.is_null() {
            let node = unsafe { curr.as_ref() }.expect("non-null NodeRef");
            if node.key != u64::MAX {
                if node.key > hi {
                    break;
                }
                if node.key >= lo {
                    out.push((node.key, node.value));
                }
            }
            curr = node.bundle().lookup(ts);
        }
        out
    }

    /// Announces process `pid` as starting a range query without walking
    /// anything yet; pair with [`Self::end_traversal`] once the caller is
    /// done reading at the returned timestamp.
    pub fn start_traversal(&self, pid: usize) -> bundle_rq::Timestamp {
        self.provider.start_traversal(pid)
    }

    /// Withdraws process `pid`'s announcement started by
    /// [`Self::start_traversal`].
    pub fn end_traversal(&self, pid: usize) {
        self.provider.end_traversal(pid);
    }

    pub fn reclaim_all(&self) {
        let oldest = self.provider.oldest_active();
        let mut curr = self.head;
        loop {
            unsafe {
                (*curr).bundle().reclaim(oldest);
                let next = (*curr).next.load(Ordering::Acquire);
                if next.is_null() {
                    break;
                }
                curr = next;
            }
        }
    }
}
