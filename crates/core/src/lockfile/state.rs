//! Immutable lockfile snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clock::CausalClock;
use super::entry::{PackageKey, PackageLockEntry, Provenance};

/// A snapshot of one machine's lockfile: resolved entries plus the causal
/// clock of the writes that produced them.
///
/// Snapshots are never mutated in place; every operation returns a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockfileState {
    #[serde(default)]
    entries: BTreeMap<PackageKey, PackageLockEntry>,
    #[serde(default)]
    clock: CausalClock,
}

impl LockfileState {
    /// An empty snapshot with an empty clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a snapshot from already-resolved parts (used by loaders and
    /// the merge engine).
    pub fn from_parts(entries: BTreeMap<PackageKey, PackageLockEntry>, clock: CausalClock) -> Self {
        Self { entries, clock }
    }

    pub fn entries(&self) -> &BTreeMap<PackageKey, PackageLockEntry> {
        &self.entries
    }

    pub fn clock(&self) -> &CausalClock {
        &self.clock
    }

    pub fn get(&self, key: &PackageKey) -> Option<&PackageLockEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a locally resolved version for `key`, written by the machine
    /// named in `provenance`.
    ///
    /// The entry keeps whatever base (and declined value) the previous entry
    /// carried, so the three-way comparison still sees the last agreed value. The writing
    /// machine's clock slot is advanced.
    #[must_use]
    pub fn record(
        &self,
        key: impl Into<PackageKey>,
        version: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        let key = key.into();
        let machine = provenance.machine_id.clone();
        let previous = self.entries.get(&key);

        let mut entries = self.entries.clone();
        entries.insert(
            key.clone(),
            PackageLockEntry {
                version: version.into(),
                provenance,
                base_version: previous.and_then(|e| e.base_version.clone()),
                rejected: previous.and_then(|e| e.rejected.clone()),
            },
        );
        debug!(package = %key, machine = %machine, "recorded lock entry");

        Self {
            entries,
            clock: self.clock.tick(&machine),
        }
    }

    /// Stop managing `key` on `machine_id`. Removing an absent key is a
    /// no-op and does not advance the clock.
    #[must_use]
    pub fn remove(&self, key: &PackageKey, machine_id: &str) -> Self {
        if !self.entries.contains_key(key) {
            return self.clone();
        }
        let mut entries = self.entries.clone();
        entries.remove(key);
        debug!(package = %key, machine = machine_id, "removed lock entry");

        Self {
            entries,
            clock: self.clock.tick(machine_id),
        }
    }

    /// Replace (or drop, for `None`) one entry without touching the clock.
    /// Used while a merge is being assembled.
    pub(crate) fn with_resolved(&self, key: &PackageKey, entry: Option<PackageLockEntry>) -> Self {
        let mut entries = self.entries.clone();
        match entry {
            Some(entry) => {
                entries.insert(key.clone(), entry);
            }
            None => {
                entries.remove(key);
            }
        }
        Self {
            entries,
            clock: self.clock.clone(),
        }
    }
}
