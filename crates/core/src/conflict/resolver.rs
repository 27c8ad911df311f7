//! Conflict resolution actions.
//!
//! [`resolve_one`] applies an explicit [`ResolutionChoice`] to one open
//! conflict and returns a new [`SyncResult`]; the input is never modified,
//! so a result can sit between calls (e.g. while a user decides) without
//! being left half-applied.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::detector::LockConflict;
use crate::errors::ConflictError;
use crate::lockfile::{PackageKey, PackageLockEntry};
use crate::sync_engine::SyncResult;

/// Explicit per-conflict choices understood by the engine.
///
/// "Pick newest" is deliberately absent: it is a policy that reads
/// timestamps and maps onto `Local` or `Remote` before reaching here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionChoice {
    /// Keep the local entry verbatim.
    Local,
    /// Adopt the remote entry verbatim.
    Remote,
    /// Roll back to the last agreed value.
    Base,
    /// Keep local and mark this remote change as seen.
    Skip,
}

impl std::fmt::Display for ResolutionChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
            Self::Base => write!(f, "base"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Record of one resolved conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedResolution {
    pub package_key: PackageKey,
    pub choice: ResolutionChoice,
    pub local_version: Option<String>,
    pub remote_version: Option<String>,
    /// Version kept in the merge; `None` when the package ends up removed.
    pub chosen_version: Option<String>,
}

/// The entry a choice selects for a conflict. `None` removes the package.
pub fn chosen_entry(conflict: &LockConflict, choice: ResolutionChoice) -> Option<PackageLockEntry> {
    match choice {
        ResolutionChoice::Local => conflict.local.clone(),
        ResolutionChoice::Remote => conflict.remote.clone(),
        ResolutionChoice::Base => {
            let base = conflict.base.as_ref()?;
            let provenance = conflict
                .local
                .as_ref()
                .or(conflict.remote.as_ref())
                .map(|e| e.provenance.clone())?;
            Some(PackageLockEntry::new(base.clone(), provenance).with_base(base.clone()))
        }
        ResolutionChoice::Skip => conflict.local.clone().map(|mut entry| {
            entry.base_version = Some(entry.version.clone());
            entry
        }),
    }
}

/// Resolve the open conflict for `package_key` with `choice`.
///
/// Fails with [`ConflictError::NotPending`] if the package has no open
/// conflict in `result`, including when it was already resolved.
pub fn resolve_one(
    result: &SyncResult,
    package_key: &PackageKey,
    choice: ResolutionChoice,
) -> Result<SyncResult, ConflictError> {
    let position = result
        .open_conflicts
        .iter()
        .position(|c| &c.package_key == package_key)
        .ok_or_else(|| ConflictError::NotPending(package_key.to_string()))?;

    let mut next = result.clone();
    let conflict = next.open_conflicts.remove(position);
    let entry = chosen_entry(&conflict, choice);
    let chosen_version = entry.as_ref().map(|e| e.version.clone());

    next.merged = next.merged.with_resolved(package_key, entry);
    next.resolutions.push(AppliedResolution {
        package_key: package_key.clone(),
        choice,
        local_version: conflict.local_version().map(str::to_string),
        remote_version: conflict.remote_version().map(str::to_string),
        chosen_version,
    });
    next.refresh_stats();

    debug!(
        package = %package_key,
        %choice,
        remaining = next.open_conflicts.len(),
        "conflict resolved"
    );
    Ok(next)
}

/// Apply `choice` to every open conflict, or only to `package_key` when
/// given (targeted mode).
pub fn resolve_matching(
    result: &SyncResult,
    package_key: Option<&PackageKey>,
    choice: ResolutionChoice,
) -> Result<SyncResult, ConflictError> {
    match package_key {
        Some(key) => resolve_one(result, key, choice),
        None => resolve_all(result, choice),
    }
}

/// Apply one choice to every open conflict in a single pass.
pub fn resolve_all(result: &SyncResult, choice: ResolutionChoice) -> Result<SyncResult, ConflictError> {
    let keys: Vec<PackageKey> = result
        .open_conflicts
        .iter()
        .map(|c| c.package_key.clone())
        .collect();
    info!(count = keys.len(), %choice, "resolving all open conflicts");

    keys.iter()
        .try_fold(result.clone(), |acc, key| resolve_one(&acc, key, choice))
}
