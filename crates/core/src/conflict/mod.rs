//! Conflict detection, resolution, and merge assembly.
//!
//! The conflict subsystem is responsible for:
//! 1. **Detection** -- three-way comparison of two concurrent snapshots.
//! 2. **Resolution** -- applying an explicit choice to each open conflict.
//! 3. **Merging** -- assembling the final snapshot and its change list.

pub mod detector;
pub mod merger;
pub mod resolver;

pub use detector::{ConflictDetector, ConflictType, LockConflict};
pub use merger::{changes, merge, PackageChange};
pub use resolver::{resolve_all, resolve_matching, resolve_one, AppliedResolution, ResolutionChoice};
