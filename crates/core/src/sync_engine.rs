//! Lockfile synchronization engine.
//!
//! A synchronization runs in two phases:
//!
//! 1. **Detection** ([`SyncEngine::sync`]): compare clocks; if the snapshots
//!    are ordered, the result is a plain fast-forward. If they diverged, run
//!    the conflict detector and produce a [`SyncResult`] holding every
//!    auto-resolved package and the open conflicts.
//! 2. **Resolution** (zero or more [`resolve_one`] calls, or a bulk
//!    [`ResolutionStrategy`]), followed by [`merge`] once nothing is open.
//!
//! Every step is a pure function over values; a `SyncResult` can be
//! serialized, shown to a user, and resumed later.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::conflict::detector::{ConflictDetector, LockConflict};
use crate::conflict::merger::{self, PackageChange};
use crate::conflict::resolver::{self, AppliedResolution, ResolutionChoice};
use crate::errors::ConflictError;
use crate::lockfile::{compare, CausalRelation, LockfileState, PackageKey};
use crate::version;

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Counters reported alongside a synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Diverged packages settled without input.
    pub auto_resolved_count: usize,
    /// Packages whose version in the working merge differs from local.
    pub changed_count: usize,
}

/// State of one synchronization between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// How local relates to remote.
    pub relation: CausalRelation,
    /// Machine performing the sync; its clock slot is advanced on merge.
    pub machine_id: String,
    /// Local parent snapshot.
    pub local: LockfileState,
    /// Remote parent snapshot.
    pub remote: LockfileState,
    /// Working merge: every settled package, with local placeholders for
    /// packages still in conflict.
    pub merged: LockfileState,
    pub open_conflicts: Vec<LockConflict>,
    pub resolutions: Vec<AppliedResolution>,
    pub stats: SyncStats,
}

impl SyncResult {
    pub fn needs_merge(&self) -> bool {
        self.relation == CausalRelation::Concurrent
    }

    pub fn is_resolved(&self) -> bool {
        self.open_conflicts.is_empty()
    }

    pub fn auto_resolvable_count(&self) -> usize {
        self.open_conflicts.iter().filter(|c| c.auto_resolvable).count()
    }

    pub fn conflict(&self, package_key: &PackageKey) -> Option<&LockConflict> {
        self.open_conflicts.iter().find(|c| &c.package_key == package_key)
    }

    /// Packages whose version the working merge would change locally.
    pub fn changes(&self) -> Vec<PackageChange> {
        merger::changes(&self.local, &self.merged)
    }

    pub(crate) fn refresh_stats(&mut self) {
        self.stats.changed_count = self.changes().len();
    }
}

// ---------------------------------------------------------------------------
// Policy layer
// ---------------------------------------------------------------------------

/// Caller-level strategies. `Newest` is turned into a concrete
/// `Local`/`Remote` choice per conflict before the engine sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    Local,
    Remote,
    Newest,
    Skip,
}

impl ResolutionStrategy {
    /// Build a strategy from mutually exclusive flags. No flag yields
    /// `Ok(None)`; more than one is a usage error.
    pub fn from_flags(
        local: bool,
        remote: bool,
        newest: bool,
        skip: bool,
    ) -> Result<Option<Self>, ConflictError> {
        let chosen: Vec<(Self, &str)> = [
            (local, Self::Local, "--local"),
            (remote, Self::Remote, "--remote"),
            (newest, Self::Newest, "--newest"),
            (skip, Self::Skip, "--skip"),
        ]
        .into_iter()
        .filter(|(set, _, _)| *set)
        .map(|(_, strategy, flag)| (strategy, flag))
        .collect();

        match chosen.as_slice() {
            [] => Ok(None),
            [(strategy, _)] => Ok(Some(*strategy)),
            many => Err(ConflictError::ConflictingStrategies(
                many.iter().map(|(_, flag)| (*flag).to_string()).collect(),
            )),
        }
    }

    /// The engine choice this strategy maps to regardless of the conflict.
    /// `None` for `Newest`, which decides per conflict.
    pub fn fixed_choice(self) -> Option<ResolutionChoice> {
        match self {
            Self::Local => Some(ResolutionChoice::Local),
            Self::Remote => Some(ResolutionChoice::Remote),
            Self::Skip => Some(ResolutionChoice::Skip),
            Self::Newest => None,
        }
    }

    /// The concrete engine choice for one conflict.
    pub fn choice_for(self, conflict: &LockConflict) -> ResolutionChoice {
        self.fixed_choice().unwrap_or_else(|| newest_choice(conflict))
    }
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
            Self::Newest => write!(f, "newest"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Pick the side modified most recently. Ties keep local; a removed side
/// carries no timestamp and loses to the side that still has the package.
fn newest_choice(conflict: &LockConflict) -> ResolutionChoice {
    match (&conflict.local, &conflict.remote) {
        (Some(l), Some(r)) if r.provenance.modified_at > l.provenance.modified_at => {
            ResolutionChoice::Remote
        }
        (None, Some(_)) => ResolutionChoice::Remote,
        _ => ResolutionChoice::Local,
    }
}

/// Apply a strategy to every open conflict, or only to `package_key`.
pub fn apply_strategy(
    result: &SyncResult,
    strategy: ResolutionStrategy,
    package_key: Option<&PackageKey>,
) -> Result<SyncResult, ConflictError> {
    info!(%strategy, targeted = package_key.is_some(), "applying resolution strategy");
    if let Some(choice) = strategy.fixed_choice() {
        return resolver::resolve_matching(result, package_key, choice);
    }

    let targets: Vec<(PackageKey, ResolutionChoice)> = match package_key {
        Some(key) => {
            let conflict = result
                .conflict(key)
                .ok_or_else(|| ConflictError::NotPending(key.to_string()))?;
            vec![(key.clone(), strategy.choice_for(conflict))]
        }
        None => result
            .open_conflicts
            .iter()
            .map(|c| (c.package_key.clone(), strategy.choice_for(c)))
            .collect(),
    };

    targets
        .iter()
        .try_fold(result.clone(), |acc, (key, choice)| {
            resolver::resolve_one(&acc, key, *choice)
        })
}

/// Close every conflict flagged `auto_resolvable` by keeping the higher
/// version. Other conflicts stay open.
pub fn auto_resolve(result: &SyncResult) -> Result<SyncResult, ConflictError> {
    let targets: Vec<(PackageKey, ResolutionChoice)> = result
        .open_conflicts
        .iter()
        .filter(|c| c.auto_resolvable)
        .filter_map(|c| {
            let ordering = version::compare_versions(c.local_version()?, c.remote_version()?)?;
            let choice = match ordering {
                Ordering::Less => ResolutionChoice::Remote,
                Ordering::Greater | Ordering::Equal => ResolutionChoice::Local,
            };
            Some((c.package_key.clone(), choice))
        })
        .collect();
    info!(count = targets.len(), "auto-resolving conflicts");

    targets
        .iter()
        .try_fold(result.clone(), |acc, (key, choice)| {
            resolver::resolve_one(&acc, key, *choice)
        })
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Entry point tying the comparator, detector, resolver and merger together
/// for one machine.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    machine_id: String,
}

impl SyncEngine {
    pub fn new(machine_id: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
        }
    }

    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    /// Detection phase: compare both snapshots and classify divergences.
    pub fn sync(&self, local: &LockfileState, remote: &LockfileState) -> SyncResult {
        let relation = compare(local.clock(), remote.clock());
        info!(machine = %self.machine_id, %relation, "comparing lockfiles");

        let mut result = SyncResult {
            relation,
            machine_id: self.machine_id.clone(),
            local: local.clone(),
            remote: remote.clone(),
            merged: local.clone(),
            open_conflicts: Vec::new(),
            resolutions: Vec::new(),
            stats: SyncStats::default(),
        };

        match relation {
            CausalRelation::Equal | CausalRelation::After => {}
            CausalRelation::Before => {
                result.merged = remote.clone();
            }
            CausalRelation::Concurrent => {
                let detection = ConflictDetector::detect(local, remote);
                result.merged =
                    LockfileState::from_parts(detection.entries, local.clock().clone());
                result.open_conflicts = detection.conflicts;
                result.stats.auto_resolved_count = detection.auto_resolved;
            }
        }
        result.refresh_stats();

        debug!(
            open = result.open_conflicts.len(),
            auto_resolved = result.stats.auto_resolved_count,
            changed = result.stats.changed_count,
            "sync detection finished"
        );
        result
    }

    /// Resolution phase for a single package.
    pub fn resolve_one(
        &self,
        result: &SyncResult,
        package_key: &PackageKey,
        choice: ResolutionChoice,
    ) -> Result<SyncResult, ConflictError> {
        resolver::resolve_one(result, package_key, choice)
    }

    /// Assemble the final snapshot once no conflicts remain.
    pub fn merge(&self, result: &SyncResult) -> Result<LockfileState, ConflictError> {
        merger::merge(result)
    }
}
