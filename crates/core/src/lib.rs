//! preflight lockfile sync core library.
//!
//! This crate decides how two machines' lockfile snapshots relate and
//! reconciles them: causal clocks, three-way conflict detection, resolution,
//! merge assembly, plus configuration, remote snapshot retrieval and
//! persistence of half-finished resolutions.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod lockfile;
pub mod pending;
pub mod remote;
pub mod report;
pub mod sync_engine;
pub mod version;

// Re-exports for convenience.
pub use config::SyncConfig;
pub use conflict::{ConflictType, LockConflict, ResolutionChoice};
pub use errors::CoreError;
pub use lockfile::{CausalClock, CausalRelation, LockfileState, PackageKey, PackageLockEntry, Provenance};
pub use report::ConflictReport;
pub use sync_engine::{ResolutionStrategy, SyncEngine, SyncResult};
