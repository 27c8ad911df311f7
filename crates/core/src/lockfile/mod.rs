//! Lockfile snapshots, causal clocks, and their on-disk form.
//!
//! A [`LockfileState`] is an immutable map of package entries plus a
//! [`CausalClock`]. The [`compare`] function decides whether two snapshots
//! are ordered or diverged; only diverged snapshots need a merge.

pub mod clock;
pub mod entry;
pub mod state;
pub mod store;

pub use clock::{compare, describe_relation, needs_merge, CausalClock, CausalRelation};
pub use entry::{PackageKey, PackageLockEntry, Provenance, Rejected};
pub use state::LockfileState;
