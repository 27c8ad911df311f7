//! Machine-readable conflict report.
//!
//! This is the JSON shape emitted by `preflight conflicts --json`.

use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictType, LockConflict};
use crate::lockfile::describe_relation;
use crate::sync_engine::SyncResult;

/// One conflict as shown to users and scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub package_key: String,
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub local_version: Option<String>,
    pub remote_version: Option<String>,
    pub auto_resolvable: bool,
}

impl From<&LockConflict> for ConflictSummary {
    fn from(c: &LockConflict) -> Self {
        Self {
            package_key: c.package_key.to_string(),
            conflict_type: c.conflict_type,
            local_version: c.local_version().map(str::to_string),
            remote_version: c.remote_version().map(str::to_string),
            auto_resolvable: c.auto_resolvable,
        }
    }
}

/// Summary of a synchronization's open conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub relation: String,
    pub total_conflicts: usize,
    pub auto_resolvable: usize,
    pub manual_conflicts: Vec<ConflictSummary>,
    pub needs_merge: bool,
}

impl ConflictReport {
    pub fn from_result(result: &SyncResult) -> Self {
        Self {
            relation: describe_relation(Some(result.relation)).to_string(),
            total_conflicts: result.open_conflicts.len(),
            auto_resolvable: result.auto_resolvable_count(),
            manual_conflicts: result.open_conflicts.iter().map(ConflictSummary::from).collect(),
            needs_merge: result.needs_merge(),
        }
    }

    /// Report for when one side has no snapshot and nothing was compared.
    pub fn unknown() -> Self {
        Self {
            relation: describe_relation(None).to_string(),
            total_conflicts: 0,
            auto_resolvable: 0,
            manual_conflicts: Vec::new(),
            needs_merge: false,
        }
    }
}
