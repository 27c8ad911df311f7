//! Conflict detection logic.
//!
//! Given two concurrently edited snapshots, the detector performs a
//! three-way comparison per package against the last agreed value recorded
//! in each entry's `base_version`. Packages changed on only one side are
//! fast-forwarded; packages changed differently on both sides become open
//! conflicts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::lockfile::{LockfileState, PackageKey, PackageLockEntry};
use crate::version;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Categorisation of a conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConflictType {
    /// Both sides changed an existing package to different versions.
    BothModified,
    /// One side removed the package, the other changed it.
    VersionMismatch,
    /// The package is new on both sides, with different versions.
    BothAdded,
    /// Both sides removed the package. Always settled silently.
    BothRemoved,
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BothModified => write!(f, "BothModified"),
            Self::VersionMismatch => write!(f, "VersionMismatch"),
            Self::BothAdded => write!(f, "BothAdded"),
            Self::BothRemoved => write!(f, "BothRemoved"),
        }
    }
}

/// A package whose value diverged on both sides.
///
/// Exists only for the duration of one synchronization; never persisted to
/// the lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConflict {
    pub package_key: PackageKey,
    pub conflict_type: ConflictType,
    /// Local entry, `None` when local removed the package.
    pub local: Option<PackageLockEntry>,
    /// Remote entry, `None` when remote removed the package.
    pub remote: Option<PackageLockEntry>,
    /// Last agreed version, `None` when the package is new on both sides.
    pub base: Option<String>,
    /// A deterministic winner exists (one version strictly upgrades the
    /// other). Advisory: only opt-in bulk auto-resolution looks at it.
    pub auto_resolvable: bool,
}

impl LockConflict {
    pub fn local_version(&self) -> Option<&str> {
        self.local.as_ref().map(|e| e.version.as_str())
    }

    pub fn remote_version(&self) -> Option<&str> {
        self.remote.as_ref().map(|e| e.version.as_str())
    }
}

/// Outcome of comparing one package on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No input needed. `None` means the package is dropped.
    AutoResolved(Option<PackageLockEntry>),
    /// Both sides agree and neither changed since the last sync.
    Unchanged(PackageLockEntry),
    /// A human (or an explicit policy) must choose.
    Conflict(LockConflict),
}

/// Result of running the detector over two snapshots.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Entries settled without input, plus the local value of every
    /// conflicted package as a placeholder until it is resolved.
    pub entries: BTreeMap<PackageKey, PackageLockEntry>,
    /// Open conflicts, ordered by package key.
    pub conflicts: Vec<LockConflict>,
    /// Packages that diverged but were settled automatically.
    pub auto_resolved: usize,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Stateless conflict detector that compares two snapshots.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Compare two concurrently edited snapshots package by package.
    ///
    /// Callers should only invoke this when the snapshots' clocks are
    /// concurrent; for ordered snapshots a fast-forward is correct and
    /// detection would invent conflicts out of ordinary history.
    pub fn detect(local: &LockfileState, remote: &LockfileState) -> Detection {
        info!(
            local_count = local.len(),
            remote_count = remote.len(),
            "detecting lockfile conflicts"
        );

        let mut detection = Detection::default();
        let keys: std::collections::BTreeSet<&PackageKey> =
            local.entries().keys().chain(remote.entries().keys()).collect();

        for key in keys {
            let l = local.get(key);
            let r = remote.get(key);
            match classify(key, l, r) {
                Classification::Unchanged(entry) => {
                    detection.entries.insert(key.clone(), entry);
                }
                Classification::AutoResolved(entry) => {
                    detection.auto_resolved += 1;
                    if let Some(entry) = entry {
                        detection.entries.insert(key.clone(), entry);
                    }
                }
                Classification::Conflict(conflict) => {
                    debug!(
                        package = %conflict.package_key,
                        conflict_type = %conflict.conflict_type,
                        auto_resolvable = conflict.auto_resolvable,
                        "conflict detected"
                    );
                    if let Some(placeholder) = l {
                        detection.entries.insert(key.clone(), placeholder.clone());
                    }
                    detection.conflicts.push(conflict);
                }
            }
        }

        info!(
            conflicts = detection.conflicts.len(),
            auto_resolved = detection.auto_resolved,
            "conflict detection complete"
        );
        detection
    }
}

/// The last agreed value for a package. When both sides record a base and
/// they disagree, the local record wins.
fn base_of<'a>(
    local: Option<&'a PackageLockEntry>,
    remote: Option<&'a PackageLockEntry>,
) -> Option<&'a str> {
    local
        .and_then(|e| e.base_version.as_deref())
        .or_else(|| remote.and_then(|e| e.base_version.as_deref()))
}

/// Three-way classification of a single package.
pub fn classify(
    key: &PackageKey,
    local: Option<&PackageLockEntry>,
    remote: Option<&PackageLockEntry>,
) -> Classification {
    let base = base_of(local, remote);

    let conflict = |conflict_type: ConflictType| {
        let auto_resolvable = match (local, remote) {
            (Some(l), Some(r)) => version::is_strict_upgrade_pair(&l.version, &r.version),
            _ => false,
        };
        Classification::Conflict(LockConflict {
            package_key: key.clone(),
            conflict_type,
            local: local.cloned(),
            remote: remote.cloned(),
            base: base.map(str::to_string),
            auto_resolvable,
        })
    };

    match (local, remote) {
        (Some(l), Some(r)) => {
            if l.version == r.version {
                if base == Some(l.version.as_str()) {
                    Classification::Unchanged(l.clone())
                } else {
                    debug!(package = %key, version = %l.version, "converged independently");
                    Classification::AutoResolved(Some(l.clone()))
                }
            } else if l.declined(Some(r)) {
                debug!(package = %key, version = %r.version, "remote value already declined, keeping local");
                Classification::AutoResolved(Some(l.clone()))
            } else if r.declined(Some(l)) {
                debug!(package = %key, version = %l.version, "local value declined by remote");
                Classification::AutoResolved(Some(r.clone()))
            } else if base == Some(l.version.as_str()) {
                debug!(package = %key, version = %r.version, "only remote changed, fast-forward");
                Classification::AutoResolved(Some(r.clone()))
            } else if base == Some(r.version.as_str()) {
                debug!(package = %key, version = %l.version, "only local changed, keeping local");
                Classification::AutoResolved(Some(l.clone()))
            } else if base.is_none() {
                conflict(ConflictType::BothAdded)
            } else {
                conflict(ConflictType::BothModified)
            }
        }
        (Some(present), None) | (None, Some(present)) => {
            let local_side = local.is_some();
            match base {
                _ if present.declined(None) => {
                    debug!(package = %key, local_side, "removal already declined, keeping");
                    Classification::AutoResolved(Some(present.clone()))
                }
                None => {
                    debug!(package = %key, local_side, "added on one side only");
                    Classification::AutoResolved(Some(present.clone()))
                }
                Some(b) if b == present.version => {
                    debug!(package = %key, local_side, "removed on the other side, dropping");
                    Classification::AutoResolved(None)
                }
                Some(_) => conflict(ConflictType::VersionMismatch),
            }
        }
        (None, None) => Classification::AutoResolved(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockfile::{CausalClock, Provenance, Rejected};
    use chrono::Utc;

    fn entry(version: &str, base: Option<&str>) -> PackageLockEntry {
        let e = PackageLockEntry::new(version, Provenance::new("m", "host", Utc::now()));
        match base {
            Some(b) => e.with_base(b),
            None => e,
        }
    }

    fn state(pairs: &[(&str, PackageLockEntry)]) -> LockfileState {
        let entries = pairs
            .iter()
            .map(|(k, e)| (PackageKey::from(*k), e.clone()))
            .collect();
        LockfileState::from_parts(entries, CausalClock::new())
    }

    fn key() -> PackageKey {
        PackageKey::from("brew:go")
    }

    #[test]
    fn test_converged_versions_never_conflict() {
        let l = entry("1.22", Some("1.20"));
        let r = entry("1.22", Some("1.20"));
        assert!(matches!(
            classify(&key(), Some(&l), Some(&r)),
            Classification::AutoResolved(Some(_))
        ));
    }

    #[test]
    fn test_untouched_package_is_unchanged() {
        let l = entry("1.20", Some("1.20"));
        assert!(matches!(
            classify(&key(), Some(&l), Some(&l)),
            Classification::Unchanged(_)
        ));
    }

    #[test]
    fn test_only_local_changed() {
        let l = entry("1.21", Some("1.20"));
        let r = entry("1.20", Some("1.20"));
        match classify(&key(), Some(&l), Some(&r)) {
            Classification::AutoResolved(Some(e)) => assert_eq!(e.version, "1.21"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_only_remote_changed() {
        let l = entry("1.20", Some("1.20"));
        let r = entry("1.22", Some("1.20"));
        match classify(&key(), Some(&l), Some(&r)) {
            Classification::AutoResolved(Some(e)) => assert_eq!(e.version, "1.22"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_both_modified() {
        let l = entry("1.21", Some("1.20"));
        let r = entry("1.22", Some("1.20"));
        match classify(&key(), Some(&l), Some(&r)) {
            Classification::Conflict(c) => {
                assert_eq!(c.conflict_type, ConflictType::BothModified);
                assert_eq!(c.base.as_deref(), Some("1.20"));
                assert!(c.auto_resolvable);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_both_added_unorderable() {
        let l = entry("nightly", None);
        let r = entry("stable", None);
        match classify(&key(), Some(&l), Some(&r)) {
            Classification::Conflict(c) => {
                assert_eq!(c.conflict_type, ConflictType::BothAdded);
                assert!(!c.auto_resolvable);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_removed_vs_changed() {
        let r = entry("1.22", Some("1.20"));
        match classify(&key(), None, Some(&r)) {
            Classification::Conflict(c) => {
                assert_eq!(c.conflict_type, ConflictType::VersionMismatch);
                assert!(c.local.is_none());
                assert!(!c.auto_resolvable);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_removed_vs_unchanged_drops() {
        let l = entry("1.20", Some("1.20"));
        assert_eq!(
            classify(&key(), Some(&l), None),
            Classification::AutoResolved(None)
        );
    }

    #[test]
    fn test_declined_remote_value_keeps_local() {
        // Local kept 1.21 over 1.22 last time; the base was advanced to 1.21.
        let mut l = entry("1.21", Some("1.21"));
        l.rejected = Some(Rejected::Version("1.22".into()));
        let stale = entry("1.22", Some("1.20"));
        match classify(&key(), Some(&l), Some(&stale)) {
            Classification::AutoResolved(Some(e)) => assert_eq!(e.version, "1.21"),
            other => panic!("unexpected {other:?}"),
        }

        // A newer remote value is a real change again.
        let newer = entry("1.23", Some("1.20"));
        match classify(&key(), Some(&l), Some(&newer)) {
            Classification::AutoResolved(Some(e)) => assert_eq!(e.version, "1.23"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_declined_removal_keeps_package() {
        let mut l = entry("1.21", Some("1.21"));
        l.rejected = Some(Rejected::Removed);
        assert_eq!(
            classify(&key(), Some(&l), None),
            Classification::AutoResolved(Some(l.clone()))
        );
    }

    #[test]
    fn test_added_on_one_side() {
        let r = entry("0.9", None);
        assert_eq!(
            classify(&key(), None, Some(&r)),
            Classification::AutoResolved(Some(r.clone()))
        );
    }

    #[test]
    fn test_empty_version_is_still_managed() {
        let l = entry("", Some(""));
        let r = entry("1.0", Some(""));
        match classify(&key(), Some(&l), Some(&r)) {
            Classification::AutoResolved(Some(e)) => assert_eq!(e.version, "1.0"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_detect_partitions_packages() {
        let local = state(&[
            ("brew:go", entry("1.21", Some("1.20"))),
            ("brew:jq", entry("1.7", Some("1.6"))),
            ("brew:rg", entry("14.0", Some("14.0"))),
        ]);
        let remote = state(&[
            ("brew:go", entry("1.22", Some("1.20"))),
            ("brew:jq", entry("1.6", Some("1.6"))),
            ("brew:rg", entry("14.0", Some("14.0"))),
            ("npm:tsx", entry("4.7.0", None)),
        ]);

        let detection = ConflictDetector::detect(&local, &remote);
        assert_eq!(detection.conflicts.len(), 1);
        assert_eq!(detection.conflicts[0].package_key, PackageKey::from("brew:go"));
        assert_eq!(detection.auto_resolved, 2);
        assert_eq!(detection.entries.len(), 4);
        assert_eq!(
            detection.entries[&PackageKey::from("brew:jq")].version,
            "1.7"
        );
        // Conflicted package holds the local value until resolved.
        assert_eq!(
            detection.entries[&PackageKey::from("brew:go")].version,
            "1.21"
        );
    }
}
