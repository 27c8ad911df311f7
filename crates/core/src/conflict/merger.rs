//! Merge assembly.
//!
//! Once every conflict is resolved, [`merge`] produces the final snapshot:
//! the union of both parents' packages mapped to their resolved values, with
//! a clock that dominates both parents.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::resolver::ResolutionChoice;
use crate::errors::ConflictError;
use crate::lockfile::{CausalRelation, LockfileState, PackageKey, PackageLockEntry, Rejected};
use crate::sync_engine::SyncResult;

/// One package whose version the caller has to apply locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageChange {
    pub package_key: PackageKey,
    /// Local version before the merge; `None` if not installed.
    pub before: Option<String>,
    /// Version after the merge; `None` if the package is removed.
    pub after: Option<String>,
}

impl PackageChange {
    pub fn is_install(&self) -> bool {
        self.before.is_none() && self.after.is_some()
    }

    pub fn is_removal(&self) -> bool {
        self.before.is_some() && self.after.is_none()
    }
}

/// Build the final merged snapshot.
///
/// For ordered snapshots this is the fast-forward target, returned
/// unchanged (no clock bump). For concurrent snapshots every package in
/// either parent is mapped to its resolved value, each entry's base is
/// stamped with that value, and the clock becomes the join of both parents
/// with the local machine's slot advanced once.
///
/// Packages resolved by an explicit choice other than `Remote` also record
/// the remote value they overrode, so a peer that has not pulled the merge
/// yet cannot bring it back on the next concurrent sync.
pub fn merge(result: &SyncResult) -> Result<LockfileState, ConflictError> {
    if !result.open_conflicts.is_empty() {
        return Err(ConflictError::Unresolved(result.open_conflicts.len()));
    }

    match result.relation {
        CausalRelation::Equal | CausalRelation::After => {
            debug!(relation = ?result.relation, "no merge needed, keeping local");
            return Ok(result.local.clone());
        }
        CausalRelation::Before => {
            debug!("fast-forwarding to remote");
            return Ok(result.remote.clone());
        }
        CausalRelation::Concurrent => {}
    }

    let explicit: BTreeMap<&PackageKey, ResolutionChoice> = result
        .resolutions
        .iter()
        .map(|r| (&r.package_key, r.choice))
        .collect();

    let keys: BTreeSet<&PackageKey> = result
        .local
        .entries()
        .keys()
        .chain(result.remote.entries().keys())
        .collect();

    let mut entries = BTreeMap::new();
    for key in keys {
        let Some(resolved) = result.merged.get(key) else {
            debug!(package = %key, "dropped in merge");
            continue;
        };
        // Whole entries come from the parent snapshots so nothing is
        // reconstructed from the resolution record alone.
        let choice = explicit.get(key);
        let mut entry = match choice {
            Some(ResolutionChoice::Remote) => source(&result.remote, key, resolved),
            Some(ResolutionChoice::Local) => source(&result.local, key, resolved),
            _ => resolved.clone(),
        };
        let remote = result.remote.get(key);
        entry.rejected = match choice {
            // A hand-picked value remembers the remote value it overrode.
            Some(_) => Some(Rejected::of(remote)).filter(|r| !r.matches(Some(&entry))),
            None => entry.rejected.take().filter(|r| {
                !r.matches(Some(&entry))
                    && (r.matches(result.local.get(key)) || r.matches(remote))
            }),
        };
        entry.base_version = Some(entry.version.clone());
        entries.insert(key.clone(), entry);
    }

    let clock = result
        .local
        .clock()
        .join(result.remote.clock())
        .checked_tick(&result.machine_id)
        .ok_or_else(|| ConflictError::ClockOverflow(result.machine_id.clone()))?;

    info!(
        entries = entries.len(),
        machine = %result.machine_id,
        "merged lockfile assembled"
    );
    Ok(LockfileState::from_parts(entries, clock))
}

fn source(parent: &LockfileState, key: &PackageKey, fallback: &PackageLockEntry) -> PackageLockEntry {
    parent.get(key).unwrap_or(fallback).clone()
}

/// Packages whose version differs between `local` and `merged`.
pub fn changes(local: &LockfileState, merged: &LockfileState) -> Vec<PackageChange> {
    let keys: BTreeSet<&PackageKey> = local
        .entries()
        .keys()
        .chain(merged.entries().keys())
        .collect();

    keys.into_iter()
        .filter_map(|key| {
            let before = local.get(key).map(|e| e.version.clone());
            let after = merged.get(key).map(|e| e.version.clone());
            (before != after).then(|| PackageChange {
                package_key: key.clone(),
                before,
                after,
            })
        })
        .collect()
}
