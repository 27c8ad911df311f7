//! Package lock entries and their provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-qualified package identifier, e.g. `brew:ripgrep`.
///
/// The key is opaque to the sync engine: it is only compared for equality
/// and ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageKey(String);

impl PackageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which machine wrote an entry, and when.
///
/// Only consulted for optional recency tie-breaks; never for authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub machine_id: String,
    pub hostname: String,
    pub modified_at: DateTime<Utc>,
}

impl Provenance {
    pub fn new(
        machine_id: impl Into<String>,
        hostname: impl Into<String>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            hostname: hostname.into(),
            modified_at,
        }
    }
}

/// The resolved state of one package on one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLockEntry {
    /// Resolved version string. May be empty; an empty version is still a
    /// managed package.
    pub version: String,

    /// Who wrote this entry.
    pub provenance: Provenance,

    /// The value both machines last agreed on. `None` means the key did not
    /// exist at the last common point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<String>,

    /// Remote value this machine turned down when it last resolved the
    /// package by hand. A peer still holding that value has not seen the
    /// decision yet, so its copy is not treated as a fresh change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<Rejected>,
}

/// A declined value: either a specific version or the package's removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejected {
    Version(String),
    Removed,
}

impl Rejected {
    /// The value `entry` stands for (`None` meaning removed).
    pub fn of(entry: Option<&PackageLockEntry>) -> Self {
        match entry {
            Some(e) => Self::Version(e.version.clone()),
            None => Self::Removed,
        }
    }

    pub fn matches(&self, entry: Option<&PackageLockEntry>) -> bool {
        match (self, entry) {
            (Self::Version(v), Some(e)) => *v == e.version,
            (Self::Removed, None) => true,
            _ => false,
        }
    }
}

impl PackageLockEntry {
    pub fn new(version: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            version: version.into(),
            provenance,
            base_version: None,
            rejected: None,
        }
    }

    /// Builder-style setter for the agreed base value.
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base_version = Some(base.into());
        self
    }

    /// Whether `other` carries a value this entry already turned down.
    pub fn declined(&self, other: Option<&PackageLockEntry>) -> bool {
        self.rejected.as_ref().is_some_and(|r| r.matches(other))
    }
}
