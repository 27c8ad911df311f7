//! Per-machine causal clocks and the causal comparator.
//!
//! Every machine owns one slot of the clock and only ever increments that
//! slot. Comparing two clocks slot by slot tells us whether one snapshot was
//! derived from the other or whether both were edited independently, without
//! any central sequencer.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How two snapshots relate causally, seen from the local side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausalRelation {
    /// Identical clocks.
    Equal,
    /// Local is an ancestor of remote: pull needed.
    Before,
    /// Remote is an ancestor of local: push needed.
    After,
    /// Both sides changed independently: merge needed.
    Concurrent,
}

/// User-facing text for a relation that could not be determined.
pub const UNKNOWN_RELATION: &str = "unknown";

impl CausalRelation {
    /// The relation as seen from the other side.
    pub fn inverse(self) -> Self {
        match self {
            Self::Before => Self::After,
            Self::After => Self::Before,
            other => other,
        }
    }

    /// User-facing description.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Equal => "equal (in sync)",
            Self::Before => "behind (pull needed)",
            Self::After => "ahead (push needed)",
            Self::Concurrent => "concurrent (merge needed)",
        }
    }
}

impl std::fmt::Display for CausalRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// Render an optional relation, falling back to [`UNKNOWN_RELATION`].
pub fn describe_relation(relation: Option<CausalRelation>) -> &'static str {
    relation.map_or(UNKNOWN_RELATION, CausalRelation::describe)
}

/// Mapping from machine id to that machine's write counter.
///
/// Missing slots read as zero. The clock is never decremented and grows with
/// the number of distinct machines ever seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CausalClock(BTreeMap<String, u64>);

impl CausalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter for `machine`, zero when the machine has never written.
    pub fn get(&self, machine: &str) -> u64 {
        self.0.get(machine).copied().unwrap_or(0)
    }

    /// A new clock with `machine`'s own slot advanced by one.
    ///
    /// Saturates at `u64::MAX`; a saturated slot no longer moves, so a tick
    /// from that point on does not dominate its input. Merges go through
    /// [`CausalClock::checked_tick`] and fail instead.
    #[must_use]
    pub fn tick(&self, machine: &str) -> Self {
        self.checked_tick(machine).unwrap_or_else(|| self.clone())
    }

    /// Like [`CausalClock::tick`], but `None` when the slot is exhausted.
    pub fn checked_tick(&self, machine: &str) -> Option<Self> {
        let mut next = self.clone();
        let slot = next.0.entry(machine.to_string()).or_insert(0);
        *slot = slot.checked_add(1)?;
        Some(next)
    }

    /// Entrywise maximum of both clocks.
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        let mut joined = self.clone();
        for (machine, &count) in &other.0 {
            let slot = joined.0.entry(machine.clone()).or_insert(0);
            *slot = (*slot).max(count);
        }
        joined
    }

    /// Machines that appear in this clock.
    pub fn machines(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for CausalClock {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(m, c)| (m.into(), c)).collect())
    }
}

/// Classify how `local` relates to `remote`.
pub fn compare(local: &CausalClock, remote: &CausalClock) -> CausalRelation {
    let mut local_ahead = false;
    let mut remote_ahead = false;

    for machine in local.0.keys().chain(remote.0.keys()) {
        match local.get(machine).cmp(&remote.get(machine)) {
            Ordering::Greater => local_ahead = true,
            Ordering::Less => remote_ahead = true,
            Ordering::Equal => {}
        }
        if local_ahead && remote_ahead {
            return CausalRelation::Concurrent;
        }
    }

    match (local_ahead, remote_ahead) {
        (false, false) => CausalRelation::Equal,
        (true, false) => CausalRelation::After,
        (false, true) => CausalRelation::Before,
        (true, true) => CausalRelation::Concurrent,
    }
}

/// Whether a full merge is required, as opposed to a fast-forward or no-op.
pub fn needs_merge(local: &CausalClock, remote: &CausalClock) -> bool {
    compare(local, remote) == CausalRelation::Concurrent
}
