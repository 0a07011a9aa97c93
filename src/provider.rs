//! The RQ Provider (C4): the coordinator a host calls into around its own
//! locking and traversal to get linearizable range queries for free.
//!
//! Binds the clock (C3), announcement table (C2), and config together and
//! drives the two-phase update protocol plus traversal bookkeeping. Grounded
//! in the `RQProvider` template class of
//! `original_source/bundle/circular_bundle.h`, translated from a template
//! over the host's node/record-manager types into a narrow set of methods a
//! host calls explicitly around its own update/traversal code — this crate
//! never walks host node pointers itself (C5's "host is out of scope"
//! boundary).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::bundle::BundleHandle;
use crate::clock::Clock;
use crate::config::Config;
use crate::entry::NodeRef;
use crate::error::BrError;
use crate::rq_table::AnnouncementTable;
use crate::timestamp::Timestamp;

struct Cleanup {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Coordinates bundles for every node in the host's structure.
///
/// `N` is the host's node type, the same type parameter every
/// [`BundleHandle<N>`] and [`NodeRef<N>`] in the system shares.
pub struct RqProvider<N> {
    clock: Arc<Clock>,
    table: Arc<AnnouncementTable>,
    config: Config,
    cleanup: std::sync::Mutex<Option<Cleanup>>,
    _marker: std::marker::PhantomData<fn() -> N>,
}

impl<N> RqProvider<N> {
    /// Builds a provider for up to `num_processes` concurrently registered
    /// range-query processes.
    ///
    /// # Errors
    ///
    /// Returns [`BrError::TooManyProcesses`] if `num_processes` is `0`.
    pub fn init(num_processes: usize, config: Config) -> Result<Self, BrError> {
        let table = AnnouncementTable::new(num_processes, config.timestamp_relaxation)?;
        Ok(Self {
            clock: Arc::new(Clock::new()),
            table: Arc::new(table),
            config,
            cleanup: std::sync::Mutex::new(None),
            _marker: std::marker::PhantomData,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers process `pid`, resetting its announcement slot. Call once
    /// when a worker thread starts, before it calls any other provider
    /// method with that `pid`.
    ///
    /// # Errors
    ///
    /// Returns [`BrError::TooManyProcesses`] if `pid >= num_processes` (the
    /// value this provider was [`Self::init`]-ed with) — the one recoverable
    /// misuse a host can correct by raising its process cap, per
    /// `SPEC_FULL.md` §6.1. Every other provider method assumes `pid` was
    /// already registered this way and panics on an out-of-range `pid`.
    pub fn init_thread(&self, pid: usize) -> Result<(), BrError> {
        self.table.reset_slot(pid)
    }

    /// Symmetric with [`Self::init_thread`]; call when a worker thread with
    /// process id `pid` is retiring.
    ///
    /// # Errors
    ///
    /// Returns [`BrError::TooManyProcesses`] under the same condition as
    /// [`Self::init_thread`].
    pub fn deinit_thread(&self, pid: usize) -> Result<(), BrError> {
        self.table.reset_slot(pid)
    }

    /// Builds a fresh bundle for a newly allocated host node, in whichever
    /// representation this provider was configured with.
    #[must_use]
    pub fn init_bundle(&self, initial_succ: NodeRef<N>) -> BundleHandle<N> {
        BundleHandle::new(&self.config, initial_succ)
    }

    /// Installs a pending entry on every bundle touched by an update,
    /// pairing each bundle with its new successor.
    ///
    /// # Panics
    ///
    /// Panics (debug and release) if `bundles.len() != succs.len()`, and in
    /// debug builds if `bundles.len()` exceeds
    /// `Config::max_bundles_per_update` — both are host bugs, not
    /// recoverable conditions.
    pub fn prepare_bundles(&self, bundles: &[&BundleHandle<N>], succs: &[NodeRef<N>]) {
        assert_eq!(
            bundles.len(),
            succs.len(),
            "prepare_bundles: bundles/succs length mismatch"
        );
        debug_assert!(
            bundles.len() <= self.config.max_bundles_per_update,
            "prepare_bundles: {} bundles exceeds configured max {}",
            bundles.len(),
            self.config.max_bundles_per_update
        );
        for (bundle, succ) in bundles.iter().zip(succs) {
            bundle.prepare(*succ);
        }
    }

    /// Reserves the linearization timestamp for process `pid`'s in-flight
    /// update. Call after [`Self::prepare_bundles`] and before the host's
    /// own linearizing store, then pass the returned timestamp to both the
    /// store and [`Self::finalize_bundles`].
    pub fn linearize_update(&self, pid: usize) -> Timestamp {
        // SAFETY: `pid` identifies the single thread driving this update;
        // no other thread touches this slot's relaxation state concurrently.
        unsafe { self.table.relaxation_mut(pid) }.next(&self.clock)
    }

    /// Publishes `ts` on every bundle prepared for this update.
    pub fn finalize_bundles(&self, bundles: &[&BundleHandle<N>], ts: Timestamp) {
        for bundle in bundles {
            bundle.finalize(ts);
        }
    }

    /// Announces process `pid` as starting a range query, returning the
    /// snapshot timestamp it should query every bundle at.
    ///
    /// Delegates the whole raise-flag/read-clock/publish/lower-flag
    /// sequence to [`AnnouncementTable::start_traversal`] so the clock is
    /// only read while the process's slot is marked mid-announcement —
    /// see that method's doc comment for why the order matters.
    pub fn start_traversal(&self, pid: usize) -> Timestamp {
        self.table.start_traversal(pid, &self.clock)
    }

    /// Ends process `pid`'s currently-announced range query.
    pub fn end_traversal(&self, pid: usize) {
        self.table.end_traversal(pid);
    }

    /// The timestamp of the oldest still-active range query, or the
    /// reserved "none active" sentinel if none are active. Bundles may
    /// reclaim any entry strictly older than the newest entry dominating
    /// this value.
    #[must_use]
    pub fn oldest_active(&self) -> Timestamp {
        self.table.oldest_active()
    }

    /// Forwards nodes physically unlinked by the host to a record-manager
    /// callback. This crate does not implement SMR itself (out of scope),
    /// but still owns the handoff point, matching every `RQProvider` in
    /// `original_source/bundle/*.h` calling `recordmgr->retire(...)` here.
    pub fn physical_deletion_succeeded<F>(&self, retired: &[NodeRef<N>], callback: F)
    where
        F: FnOnce(&[NodeRef<N>]),
    {
        callback(retired);
    }

    /// Starts a background thread that periodically calls `sweep` with the
    /// current `oldest_active()` timestamp, letting the host reclaim every
    /// bundle reachable from its structure. Only meaningful under
    /// [`crate::config::CleanupMode::Background`]; the caller decides
    /// whether to call it based on `self.config().cleanup_mode`.
    ///
    /// # Panics
    ///
    /// Panics if a background cleanup thread is already running.
    pub fn start_cleanup<F>(&self, sweep: F)
    where
        F: Fn(Timestamp) + Send + 'static,
    {
        let mut guard = self.cleanup.lock().unwrap();
        assert!(guard.is_none(), "background cleanup already running");
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let table = Arc::clone(&self.table);
        let interval = self.config.background_sleep_interval;
        let handle = std::thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if stop_clone.load(Ordering::Relaxed) {
                    break;
                }
                sweep(table.oldest_active());
            }
        });
        *guard = Some(Cleanup { stop, handle });
    }

    /// Stops the background cleanup thread started by [`Self::start_cleanup`]
    /// and waits for it to exit. A no-op if none is running.
    pub fn stop_cleanup(&self) {
        let cleanup = self.cleanup.lock().unwrap().take();
        if let Some(cleanup) = cleanup {
            cleanup.stop.store(true, Ordering::Relaxed);
            let _ = cleanup.handle.join();
        }
    }
}

impl<N> Drop for RqProvider<N> {
    fn drop(&mut self) {
        self.stop_cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CleanupMode, Representation};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    fn test_config() -> Config {
        Config::new(
            Representation::Linked,
            4,
            1,
            CleanupMode::Background,
            false,
            16,
            StdDuration::from_millis(5),
        )
    }

    #[test]
    fn rejects_zero_processes() {
        assert!(matches!(
            RqProvider::<u64>::init(0, test_config()),
            Err(BrError::TooManyProcesses { max: 0 })
        ));
    }

    #[test]
    fn init_thread_accepts_an_in_range_pid() {
        let provider = RqProvider::<u64>::init(4, test_config()).unwrap();
        assert!(provider.init_thread(3).is_ok());
        assert!(provider.deinit_thread(3).is_ok());
    }

    #[test]
    fn init_thread_rejects_an_out_of_range_pid() {
        let provider = RqProvider::<u64>::init(4, test_config()).unwrap();
        assert_eq!(
            provider.init_thread(4),
            Err(BrError::TooManyProcesses { max: 4 })
        );
        assert_eq!(
            provider.deinit_thread(10),
            Err(BrError::TooManyProcesses { max: 4 })
        );
    }

    #[test]
    fn two_phase_update_is_visible_after_finalize() {
        let provider = RqProvider::<u64>::init(4, test_config()).unwrap();
        let bundle = provider.init_bundle(NodeRef::null());
        let succ = NodeRef::new(&42u64 as *const u64);

        provider.prepare_bundles(&[&bundle], &[succ]);
        let ts = provider.linearize_update(0);
        provider.finalize_bundles(&[&bundle], ts);

        assert_eq!(bundle.lookup(ts), succ);
    }

    #[test]
    fn traversal_announces_and_withdraws() {
        let provider = RqProvider::<u64>::init(4, test_config()).unwrap();
        assert_eq!(provider.oldest_active(), crate::timestamp::MAX_TS);
        let ts = provider.start_traversal(0);
        assert_eq!(provider.oldest_active(), ts);
        provider.end_traversal(0);
        assert_eq!(provider.oldest_active(), crate::timestamp::MAX_TS);
    }

    #[test]
    fn background_cleanup_invokes_sweep() {
        let provider = RqProvider::<u64>::init(1, test_config()).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        provider.start_cleanup(move |_oldest| {
            count_clone.fetch_add(1, Ordering::Relaxed);
        });
        std::thread::sleep(StdDuration::from_millis(50));
        provider.stop_cleanup();
        assert!(count.load(Ordering::Relaxed) > 0);
    }
}
