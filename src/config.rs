//! Tuning knobs for the bundle subsystem.
//!
//! A single `Config` value replaces the original's `BUNDLE_CIRCULAR_BUNDLE |
//! BUNDLE_LINKED_BUNDLE | BUNDLE_CLEANUP | BUNDLE_TIMESTAMP_RELAXATION | ...`
//! preprocessor matrix (`original_source/bundle/circular_bundle.h`,
//! `linked_bundle.h`) with one runtime-checked, `Copy`/`Clone` struct — the
//! same shape the teacher crate uses for its own `Config`: a `const fn new`
//! constructor that asserts its own preconditions, a `Default` impl, and
//! named presets for common tunings.

use std::time::Duration;

/// Which bundle representation a provider uses. Fixed for the provider's
/// lifetime — spec.md §9 notes the choice is global, so no per-bundle
/// dynamic dispatch is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// CAS-swung singly linked list of entries, unbounded growth, O(1)
    /// prepend, O(n) reclaim walk.
    Linked,
    /// Circular array of entries addressed modulo capacity, with in-place
    /// reclaim and amortized doubling growth.
    Circular,
}

/// How stale bundle entries get reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupMode {
    /// Never reclaim; bundles grow without bound. Useful for testing and
    /// short-lived processes.
    Off,
    /// Reclaim synchronously as part of the update path that triggered it.
    Inline,
    /// A dedicated background thread sweeps all bundles periodically.
    Background,
}

/// Tuning constants for an [`crate::provider::RqProvider`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub representation: Representation,
    pub max_bundles_per_update: usize,
    pub timestamp_relaxation: u32,
    pub cleanup_mode: CleanupMode,
    pub deferred_free: bool,
    pub initial_capacity: usize,
    pub background_sleep_interval: Duration,
}

impl Config {
    /// Builds a config, asserting its own preconditions.
    ///
    /// # Panics
    ///
    /// Panics if `max_bundles_per_update` is `0`, or if `initial_capacity` is
    /// `0`. `initial_capacity` need not be a power of two — the circular
    /// representation addresses its array modulo capacity (see
    /// `bundle::circular`), matching `BUNDLE_INIT_CAPACITY 5` in
    /// `original_source/bundle/circular_bundle.h`.
    #[must_use]
    pub const fn new(
        representation: Representation,
        max_bundles_per_update: usize,
        timestamp_relaxation: u32,
        cleanup_mode: CleanupMode,
        deferred_free: bool,
        initial_capacity: usize,
        background_sleep_interval: Duration,
    ) -> Self {
        assert!(
            max_bundles_per_update > 0,
            "max_bundles_per_update must be at least 1"
        );
        assert!(initial_capacity > 0, "initial_capacity must be nonzero");
        Self {
            representation,
            max_bundles_per_update,
            timestamp_relaxation,
            cleanup_mode,
            deferred_free,
            initial_capacity,
            background_sleep_interval,
        }
    }

    /// Low-latency preset: linked bundles (no array resize pauses), no
    /// timestamp relaxation, inline reclaim. `initial_capacity` only matters
    /// for the circular representation, but the preset still carries
    /// spec.md §6's documented default of 5.
    pub const LOW_LATENCY: Self = Self::new(
        Representation::Linked,
        4,
        1,
        CleanupMode::Inline,
        false,
        5,
        Duration::from_millis(50),
    );

    /// High-throughput preset: circular bundles, timestamp relaxation to
    /// cut clock contention, background reclaim off the hot path.
    pub const HIGH_THROUGHPUT: Self = Self::new(
        Representation::Circular,
        4,
        8,
        CleanupMode::Background,
        true,
        5,
        Duration::from_millis(200),
    );
}

impl Default for Config {
    fn default() -> Self {
        Self::LOW_LATENCY
    }
}
