//! The host-facing interface (C5): the narrow contract a concurrent
//! ordered-set implementation calls around its own node layout, locking,
//! and traversal. This crate never walks host node pointers itself — the
//! pieces here are the shape of the calling convention, not a host
//! implementation.

use crate::bundle::BundleHandle;
use crate::provider::RqProvider;
use crate::timestamp::Timestamp;

/// A host node that owns a bundle.
///
/// Implemented by the host's own node type so generic helpers (and the
/// test-only lazy-list harness) can reach a node's bundle without this
/// crate knowing anything else about node layout.
pub trait BundledNode<N> {
    fn bundle(&self) -> &BundleHandle<N>;
}

/// Runs `attempt` under a single announced range-query traversal, retrying
/// the whole traversal if `attempt` returns `None`.
///
/// Mirrors the `start_traversal` / walk / `end_traversal` pattern every
/// `rangeQuery` in `original_source/bundle_lazylist_impl.h` and
/// `bundle_skiplist_lock_impl.h` follows, including their retry-on-failed-
/// traversal loop: `attempt` reports failure (e.g. it observed the host's
/// own structure change underneath it in a way unrelated to bundle
/// timestamps) by returning `None`, and this helper re-announces a fresh
/// snapshot timestamp and tries again.
pub fn with_traversal<N, T>(
    provider: &RqProvider<N>,
    pid: usize,
    mut attempt: impl FnMut(Timestamp) -> Option<T>,
) -> T {
    loop {
        let ts = provider.start_traversal(pid);
        let result = attempt(ts);
        provider.end_traversal(pid);
        if let Some(value) = result {
            return value;
        }
    }
}
