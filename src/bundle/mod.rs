//! The per-node bundle container (C1): a timestamp-ordered log of
//! successor references, in one of two representations chosen globally for
//! the whole [`crate::provider::RqProvider`] — so no per-bundle dynamic
//! dispatch is needed, just a flat `match` (spec.md §9).

pub mod circular;
pub mod linked;

use crate::config::{Config, Representation};
use crate::entry::NodeRef;
use crate::timestamp::Timestamp;

pub use circular::CircularBundle;
pub use linked::LinkedBundle;

/// A bundle in whichever representation the provider was configured with.
pub enum BundleHandle<N> {
    Linked(LinkedBundle<N>),
    Circular(CircularBundle<N>),
}

impl<N> BundleHandle<N> {
    #[must_use]
    pub fn new(config: &Config, initial_succ: NodeRef<N>) -> Self {
        match config.representation {
            Representation::Linked => Self::Linked(LinkedBundle::with_deferred_free(
                initial_succ,
                config.deferred_free,
            )),
            Representation::Circular => {
                Self::Circular(CircularBundle::new(config.initial_capacity, initial_succ))
            }
        }
    }

    pub fn prepare(&self, succ: NodeRef<N>) {
        match self {
            Self::Linked(b) => b.prepare(succ),
            Self::Circular(b) => b.prepare(succ),
        }
    }

    pub fn finalize(&self, ts: Timestamp) {
        match self {
            Self::Linked(b) => b.finalize(ts),
            Self::Circular(b) => b.finalize(ts),
        }
    }

    #[must_use]
    pub fn lookup(&self, ts: Timestamp) -> NodeRef<N> {
        match self {
            Self::Linked(b) => b.lookup(ts),
            Self::Circular(b) => b.lookup(ts),
        }
    }

    pub fn reclaim(&self, oldest_active: Timestamp) {
        match self {
            Self::Linked(b) => b.reclaim(oldest_active),
            Self::Circular(b) => b.reclaim(oldest_active),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Linked(b) => b.size(),
            Self::Circular(b) => b.size(),
        }
    }
}
