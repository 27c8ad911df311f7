//! Error types for the preflight core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Lockfile(#[from] LockfileError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Lockfile errors
// ---------------------------------------------------------------------------

/// Errors from reading or writing a lockfile snapshot.
#[derive(Debug, Error)]
pub enum LockfileError {
    /// The snapshot bytes are not a valid lockfile.
    #[error("lockfile is corrupt or unreadable: {0}")]
    Parse(#[from] serde_json::Error),

    /// The snapshot was written by a newer, unknown format.
    #[error("unsupported lockfile format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    /// Generic I/O wrapper.
    #[error("lockfile I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from the conflict resolution and merge subsystem.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// No open conflict exists for the package (already resolved, or never
    /// part of this result).
    #[error("conflict not pending for package '{0}'")]
    NotPending(String),

    /// More than one resolution strategy was requested at once.
    #[error("choose exactly one resolution strategy, got: {}", .0.join(", "))]
    ConflictingStrategies(Vec<String>),

    /// The merge engine was invoked while conflicts are still open.
    #[error("{0} conflict(s) still unresolved; resolve them before merging")]
    Unresolved(usize),

    /// The merging machine's clock slot cannot advance any further.
    #[error("clock slot for machine '{0}' is exhausted")]
    ClockOverflow(String),
}

impl ConflictError {
    /// Whether this error stems from how the caller used the engine rather
    /// than from the data.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::NotPending(_) | Self::ConflictingStrategies(_))
    }
}

// ---------------------------------------------------------------------------
// Remote snapshot errors
// ---------------------------------------------------------------------------

/// Errors from retrieving the remote peer's lockfile.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// The lockfile is not inside a git work tree.
    #[error("no git repository found for '{0}'")]
    RepositoryNotFound(String),

    /// Generic I/O wrapper.
    #[error("remote I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ConflictError::NotPending("brew:go".into());
        assert_eq!(err.to_string(), "conflict not pending for package 'brew:go'");

        let err = ConflictError::ConflictingStrategies(vec!["--local".into(), "--remote".into()]);
        assert!(err.to_string().contains("--local, --remote"));

        let err = LockfileError::UnsupportedFormat {
            found: 9,
            expected: 1,
        };
        assert!(err.to_string().contains("version 9"));
    }

    #[test]
    fn test_usage_classification() {
        assert!(ConflictError::NotPending("x".into()).is_usage());
        assert!(!ConflictError::Unresolved(2).is_usage());
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = ConflictError::Unresolved(1).into();
        assert!(matches!(core_err, CoreError::Conflict(_)));

        let core_err: CoreError = ConfigError::FileNotFound("x".into()).into();
        assert!(matches!(core_err, CoreError::Config(_)));
    }
}
