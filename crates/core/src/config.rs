//! TOML-based configuration for lockfile synchronization.
//!
//! The machine identity may be given literally or through an `_env` field
//! naming an environment variable, resolved at runtime via
//! [`SyncConfig::resolve_env_vars`]. Everything has a default, so a missing
//! config file is not an error for [`SyncConfig::load_or_default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::lockfile::store::DEFAULT_LOCKFILE;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level sync configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Identity of this workstation.
    #[serde(default)]
    pub machine: MachineConfig,

    /// Local lockfile location.
    #[serde(default)]
    pub lockfile: LockfileConfig,

    /// Where the peer's snapshot is read from.
    #[serde(default)]
    pub remote: RemoteConfig,
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// Workstation identity, used as the clock slot and in provenance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Stable machine id. Defaults to the hostname.
    #[serde(default)]
    pub id: Option<String>,

    /// Hostname recorded in provenance. Detected when unset.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Environment variable overriding `id` (e.g. `PREFLIGHT_MACHINE_ID`).
    #[serde(default)]
    pub id_env: Option<String>,

    /// Id resolved from `id_env`.
    #[serde(skip)]
    pub resolved_id: Option<String>,
}

impl MachineConfig {
    /// Effective hostname: configured value, else detected.
    pub fn hostname(&self) -> String {
        self.hostname.clone().unwrap_or_else(detect_hostname)
    }

    /// Effective machine id: `id_env`, then `id`, then the hostname.
    pub fn machine_id(&self) -> String {
        self.resolved_id
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| self.hostname())
    }
}

fn detect_hostname() -> String {
    for var in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(name) = std::env::var(var) {
            if !name.trim().is_empty() {
                return name.trim().to_string();
            }
        }
    }
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".into())
}

// ---------------------------------------------------------------------------
// Lockfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockfileConfig {
    /// Path of the local lockfile (default `preflight.lock`).
    #[serde(default = "default_lockfile_path")]
    pub path: PathBuf,
}

fn default_lockfile_path() -> PathBuf {
    PathBuf::from(DEFAULT_LOCKFILE)
}

impl Default for LockfileConfig {
    fn default() -> Self {
        Self {
            path: default_lockfile_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Remote-tracking branch holding the peer's lockfile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Git remote name (default `origin`).
    #[serde(default = "default_remote_name")]
    pub name: String,

    /// Branch name (default `main`).
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_remote_name() -> String {
    "origin".into()
}
fn default_branch() -> String {
    "main".into()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            name: default_remote_name(),
            branch: default_branch(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Load a [`SyncConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: SyncConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults. Env references
    /// are resolved and the result validated either way.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(ConfigError::FileNotFound(p)) => {
                debug!(path = %p, "no configuration file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve `*_env` fields from environment variables.
    ///
    /// A missing variable logs a warning and falls back to the literal value.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref env_name) = self.machine.id_env {
            self.machine.resolved_id = resolve_optional_env(env_name, "machine.id_env");
        }
        Ok(())
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref id) = self.machine.id {
            if id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "machine.id".into(),
                    detail: "machine id must not be empty".into(),
                });
            }
        }
        if self.lockfile.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "lockfile.path".into(),
                detail: "lockfile path must not be empty".into(),
            });
        }
        if self.remote.name.is_empty() || self.remote.name.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "remote.name".into(),
                detail: "remote name must be a single non-empty component".into(),
            });
        }
        if self.remote.branch.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.branch".into(),
                detail: "branch must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Commented template written for new users.
    pub fn default_template() -> &'static str {
        r#"# preflight lockfile sync configuration

[machine]
# Stable id for this workstation. Defaults to the hostname.
# id = "work-laptop"
# Read the id from an environment variable instead.
# id_env = "PREFLIGHT_MACHINE_ID"

[lockfile]
path = "preflight.lock"

[remote]
name = "origin"
branch = "main"
"#
    }
}

/// Attempt to read an env var; returns `None` (with a warning) if missing.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[machine]
id = "work-laptop"
hostname = "wl01"

[lockfile]
path = "config/preflight.lock"

[remote]
name = "upstream"
branch = "dotfiles"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: SyncConfig = toml::from_str(sample_toml()).unwrap();
        assert_eq!(config.machine.machine_id(), "work-laptop");
        assert_eq!(config.machine.hostname(), "wl01");
        assert_eq!(config.lockfile.path, PathBuf::from("config/preflight.lock"));
        assert_eq!(config.remote.name, "upstream");
        assert_eq!(config.remote.branch, "dotfiles");
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(sample_toml().as_bytes()).unwrap();
        let config = SyncConfig::load_from_file(tmp.path()).unwrap();
        assert_eq!(config.remote.name, "upstream");
    }

    #[test]
    fn test_file_not_found() {
        let result = SyncConfig::load_from_file("/nonexistent/path.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"[machine\nid = ").unwrap();
        let result = SyncConfig::load_from_file(tmp.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::load_or_default(dir.path().join("sync.toml")).unwrap();
        assert_eq!(config.lockfile.path, PathBuf::from("preflight.lock"));
        assert_eq!(config.remote.name, "origin");
        assert_eq!(config.remote.branch, "main");
        assert!(!config.machine.machine_id().is_empty());
    }

    #[test]
    fn test_machine_id_defaults_to_hostname() {
        let machine = MachineConfig {
            hostname: Some("desk".into()),
            ..Default::default()
        };
        assert_eq!(machine.machine_id(), "desk");
    }

    #[test]
    fn test_validate_rejects_empty_machine_id() {
        let mut config: SyncConfig = toml::from_str(sample_toml()).unwrap();
        config.machine.id = Some("  ".into());
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "machine.id"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_remote_name() {
        let mut config: SyncConfig = toml::from_str(sample_toml()).unwrap();
        config.remote.name = "origin/main".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "remote.name"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_PREFLIGHT_MACHINE_ID", "ci-runner-7");

        let toml_str = r#"
[machine]
id = "fallback"
id_env = "TEST_PREFLIGHT_MACHINE_ID"
"#;
        let mut config: SyncConfig = toml::from_str(toml_str).unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.machine.machine_id(), "ci-runner-7");

        std::env::remove_var("TEST_PREFLIGHT_MACHINE_ID");
    }

    #[test]
    fn test_unset_env_falls_back_to_literal_id() {
        let toml_str = r#"
[machine]
id = "fallback"
id_env = "TEST_PREFLIGHT_UNSET_VARIABLE"
"#;
        let mut config: SyncConfig = toml::from_str(toml_str).unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.machine.machine_id(), "fallback");
    }

    #[test]
    fn test_default_template_is_valid() {
        let config: SyncConfig = toml::from_str(SyncConfig::default_template())
            .expect("default template should be valid TOML");
        config.validate().unwrap();
    }
}
