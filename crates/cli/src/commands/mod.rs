//! Subcommand implementations and the state they share.

pub mod conflicts;
pub mod init;
pub mod resolve;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use preflight_core::config::SyncConfig;
use preflight_core::lockfile::store;
use preflight_core::pending;
use preflight_core::remote::{self, FileRemote, GitRemote, RemoteSource};
use preflight_core::{LockfileState, SyncEngine, SyncResult};

use crate::style;

/// Per-invocation settings, resolved once from flags and the config file.
#[derive(Debug, Clone)]
pub struct Options {
    pub machine_id: String,
    pub lockfile: PathBuf,
    pub remote_lockfile: Option<PathBuf>,
    pub remote_name: String,
    pub remote_branch: String,
}

impl Options {
    /// Merge command-line flags over the config file. Flags win.
    pub fn resolve(
        config_path: &str,
        lockfile: Option<PathBuf>,
        remote_lockfile: Option<PathBuf>,
    ) -> Result<Self> {
        let resolved = expand_tilde(config_path);
        let config =
            SyncConfig::load_or_default(&resolved).context("failed to load configuration")?;

        let opts = Self {
            machine_id: config.machine.machine_id(),
            lockfile: lockfile.unwrap_or_else(|| config.lockfile.path.clone()),
            remote_lockfile,
            remote_name: config.remote.name,
            remote_branch: config.remote.branch,
        };
        debug!(
            machine = %opts.machine_id,
            lockfile = %opts.lockfile.display(),
            "resolved invocation options"
        );
        Ok(opts)
    }

    fn remote_source(&self) -> Box<dyn RemoteSource> {
        match &self.remote_lockfile {
            Some(path) => Box::new(FileRemote::new(path)),
            None => Box::new(GitRemote::new(
                &self.lockfile,
                self.remote_name.clone(),
                self.remote_branch.clone(),
            )),
        }
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(self.machine_id.clone())
    }
}

/// What loading both snapshots produced.
#[derive(Debug)]
pub enum Comparison {
    /// Both snapshots exist. Holds a fresh detection, or the pending result
    /// of an earlier partial resolution of the same snapshots.
    Ready(SyncResult),
    /// One side has no lockfile yet, so the relation is unknown.
    Missing(String),
}

/// Load both snapshots and run detection.
pub fn detect(opts: &Options) -> Result<Comparison> {
    let Some(local) = store::load(&opts.lockfile).context("failed to load local lockfile")? else {
        return Ok(Comparison::Missing(format!(
            "no local lockfile at {}",
            opts.lockfile.display()
        )));
    };

    let source = opts.remote_source();
    let Some(remote) =
        remote::fetch_state(source.as_ref()).context("failed to load remote lockfile")?
    else {
        return Ok(Comparison::Missing(format!(
            "no remote lockfile at {}",
            source.describe()
        )));
    };

    let resumed = pending::resume(&opts.lockfile, &opts.machine_id, &local, &remote)
        .context("failed to read pending resolution")?;
    if let Some(result) = resumed {
        debug!(
            resolved = result.resolutions.len(),
            open = result.open_conflicts.len(),
            "resuming pending resolution"
        );
        return Ok(Comparison::Ready(result));
    }
    Ok(Comparison::Ready(opts.engine().sync(&local, &remote)))
}

pub fn print_missing(reason: &str) {
    println!("{}", style::dim(reason));
    println!("nothing to compare");
}

/// Merge a fully resolved result and write it over the local lockfile.
/// Returns whether the file changed. Any pending partial result is dropped.
pub fn write_merged(opts: &Options, result: &SyncResult) -> Result<bool> {
    let merged: LockfileState = opts
        .engine()
        .merge(result)
        .context("failed to assemble merged lockfile")?;
    pending::clear(&opts.lockfile).context("failed to remove pending resolution")?;
    if merged == result.local {
        return Ok(false);
    }
    store::save(&opts.lockfile, &merged).context("failed to write merged lockfile")?;
    Ok(true)
}

/// Keep a partially resolved result for the next invocation.
pub fn save_pending(opts: &Options, result: &SyncResult) -> Result<()> {
    pending::save(&opts.lockfile, result).context("failed to save pending resolution")
}

/// Reminder printed after the lockfile is rewritten.
pub fn print_commit_hint(lockfile: &Path) {
    println!();
    println!(
        "{}",
        style::dim(&format!(
            "Commit and push {} so your other machines pick up the merge.",
            lockfile.display()
        ))
    );
}

/// Expand `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Two machines' lockfiles on disk, diverged on `brew:go` and `brew:jq`.

    use std::path::Path;

    use chrono::Utc;
    use preflight_core::lockfile::store;
    use preflight_core::{CausalClock, LockfileState, PackageKey, PackageLockEntry, Provenance};
    use tempfile::TempDir;

    use super::Options;

    pub fn side(pairs: &[(&str, &str)], machine: &str, clock: &[(&str, u64)]) -> LockfileState {
        LockfileState::from_parts(
            pairs
                .iter()
                .map(|&(key, version)| {
                    let entry =
                        PackageLockEntry::new(version, Provenance::new(machine, "host", Utc::now()))
                            .with_base("1.0");
                    (PackageKey::from(key), entry)
                })
                .collect(),
            clock.iter().copied().collect::<CausalClock>(),
        )
    }

    pub fn options(dir: &Path) -> Options {
        Options {
            machine_id: "A".into(),
            lockfile: dir.join("preflight.lock"),
            remote_lockfile: Some(dir.join("remote.lock")),
            remote_name: "origin".into(),
            remote_branch: "main".into(),
        }
    }

    /// Local has go 1.21 / jq 1.7, remote has go 1.22 / jq 1.8.
    pub fn diverged() -> (TempDir, Options) {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path());
        let local = side(&[("brew:go", "1.21"), ("brew:jq", "1.7")], "A", &[("A", 2), ("B", 1)]);
        let remote = side(&[("brew:go", "1.22"), ("brew:jq", "1.8")], "B", &[("A", 1), ("B", 2)]);
        store::save(&opts.lockfile, &local).unwrap();
        store::save(opts.remote_lockfile.as_ref().unwrap(), &remote).unwrap();
        (dir, opts)
    }

    /// Both sides hold the same snapshot.
    pub fn in_sync() -> (TempDir, Options) {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path());
        let state = side(&[("brew:go", "1.21")], "A", &[("A", 1)]);
        store::save(&opts.lockfile, &state).unwrap();
        store::save(opts.remote_lockfile.as_ref().unwrap(), &state).unwrap();
        (dir, opts)
    }

    pub fn version_of(opts: &Options, key: &str) -> Option<String> {
        store::load(&opts.lockfile)
            .unwrap()
            .and_then(|s| s.get(&PackageKey::from(key)).map(|e| e.version.clone()))
    }
}
