//! Lock-free linearizable range queries for pointer-linked concurrent
//! ordered sets.
//!
//! A lazy list or skip list gets wait-free, linearizable range queries for
//! free by attaching a *bundle* — a small timestamp-ordered log of past
//! successor references — to each node, and routing every update and
//! traversal through an [`RqProvider`]. Updates install a pending bundle
//! entry, reserve a linearization timestamp from a shared clock, perform
//! their own host-side linearizing store, then publish the timestamp on
//! the pending entry. Range queries announce a snapshot timestamp and walk
//! bundles instead of the live structure, so they see a single consistent
//! point in time no matter how many updates race past them.
//!
//! ```
//! use bundle_rq::{Config, NodeRef, RqProvider};
//!
//! let provider = RqProvider::<u64>::init(4, Config::default()).unwrap();
//! let bundle = provider.init_bundle(NodeRef::null());
//!
//! // An update: prepare, reserve a timestamp, finalize.
//! let new_value = 7u64;
//! let succ = NodeRef::new(&new_value as *const u64);
//! provider.prepare_bundles(&[&bundle], &[succ]);
//! let ts = provider.linearize_update(0);
//! // ... the host's own linearizing store would happen here ...
//! provider.finalize_bundles(&[&bundle], ts);
//!
//! // A range query: announce, read a consistent snapshot, withdraw.
//! let snapshot_ts = provider.start_traversal(1);
//! assert_eq!(bundle.lookup(snapshot_ts), succ);
//! provider.end_traversal(1);
//! ```
//!
//! This crate does not implement a host data structure, node allocation, or
//! safe memory reclamation — it only provides the bundle log, the
//! announcement table, the shared clock, and the coordinator tying them
//! together. See `SPEC_FULL.md` and `DESIGN.md` in the repository for the
//! full component breakdown and the sources each part is grounded on.

mod backoff;
pub mod bundle;
pub mod clock;
pub mod config;
mod entry;
mod error;
pub mod host;
mod invariants;
pub mod provider;
pub mod rq_table;
pub mod timestamp;

pub use backoff::Backoff;
pub use bundle::{BundleHandle, CircularBundle, LinkedBundle};
pub use clock::{Clock, Relaxation};
pub use config::{CleanupMode, Config, Representation};
pub use entry::NodeRef;
pub use error::BrError;
pub use host::{with_traversal, BundledNode};
pub use provider::RqProvider;
pub use rq_table::AnnouncementTable;
pub use timestamp::{Timestamp, MAX_TS, MIN_TS, NULL_TS, PENDING_TS};
