//! Partially resolved synchronizations kept between invocations.
//!
//! Resolving one package at a time leaves a [`SyncResult`] with conflicts
//! still open. It is stored next to the lockfile as `<lockfile>.pending` and
//! picked up again by the next invocation, as long as both parent snapshots
//! are still the ones it was computed from.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::LockfileError;
use crate::lockfile::LockfileState;
use crate::sync_engine::SyncResult;

/// Where the pending result for `lockfile` lives.
pub fn pending_path(lockfile: &Path) -> PathBuf {
    let mut name = lockfile.as_os_str().to_owned();
    name.push(".pending");
    PathBuf::from(name)
}

/// Read the pending result for `lockfile`, if any.
pub fn load(lockfile: &Path) -> Result<Option<SyncResult>, LockfileError> {
    let path = pending_path(lockfile);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)?;
    let result: SyncResult = serde_json::from_slice(&bytes)?;
    debug!(
        path = %path.display(),
        open = result.open_conflicts.len(),
        resolved = result.resolutions.len(),
        "loaded pending resolution"
    );
    Ok(Some(result))
}

/// The pending result for `lockfile` if it was computed from exactly these
/// parents on this machine. A stale file is removed.
pub fn resume(
    lockfile: &Path,
    machine_id: &str,
    local: &LockfileState,
    remote: &LockfileState,
) -> Result<Option<SyncResult>, LockfileError> {
    let Some(result) = load(lockfile)? else {
        return Ok(None);
    };
    if result.machine_id == machine_id && result.local == *local && result.remote == *remote {
        return Ok(Some(result));
    }
    info!(path = %pending_path(lockfile).display(), "discarding stale pending resolution");
    clear(lockfile)?;
    Ok(None)
}

/// Store a partially resolved result for the next invocation.
pub fn save(lockfile: &Path, result: &SyncResult) -> Result<(), LockfileError> {
    let path = pending_path(lockfile);
    let mut contents = serde_json::to_string_pretty(result)?;
    contents.push('\n');

    let tmp = path.with_extension("pending.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, &path)?;

    info!(
        path = %path.display(),
        open = result.open_conflicts.len(),
        "pending resolution saved"
    );
    Ok(())
}

/// Remove the pending result. Returns whether one existed.
pub fn clear(lockfile: &Path) -> Result<bool, LockfileError> {
    let path = pending_path(lockfile);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "pending resolution cleared");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ResolutionChoice;
    use crate::lockfile::{CausalClock, PackageKey, PackageLockEntry, Provenance};
    use crate::sync_engine::SyncEngine;
    use chrono::Utc;

    fn side(go: &str, jq: &str, machine: &str, clock: &[(&str, u64)]) -> LockfileState {
        let mk = |v: &str| {
            PackageLockEntry::new(v, Provenance::new(machine, "host", Utc::now())).with_base("1.0")
        };
        LockfileState::from_parts(
            [
                (PackageKey::from("brew:go"), mk(go)),
                (PackageKey::from("brew:jq"), mk(jq)),
            ]
            .into_iter()
            .collect(),
            clock.iter().copied().collect::<CausalClock>(),
        )
    }

    fn partial() -> SyncResult {
        let local = side("1.21", "1.7", "A", &[("A", 2), ("B", 1)]);
        let remote = side("1.22", "1.8", "B", &[("A", 1), ("B", 2)]);
        let result = SyncEngine::new("A").sync(&local, &remote);
        crate::conflict::resolve_one(&result, &"brew:go".into(), ResolutionChoice::Remote).unwrap()
    }

    #[test]
    fn test_pending_path_appends_suffix() {
        assert_eq!(
            pending_path(Path::new("dir/preflight.lock")),
            PathBuf::from("dir/preflight.lock.pending")
        );
    }

    #[test]
    fn test_save_then_resume() {
        let dir = tempfile::tempdir().unwrap();
        let lockfile = dir.path().join("preflight.lock");
        let result = partial();

        save(&lockfile, &result).unwrap();
        assert!(pending_path(&lockfile).exists());

        let resumed = resume(&lockfile, "A", &result.local, &result.remote)
            .unwrap()
            .expect("pending result should be reused");
        assert_eq!(resumed, result);
        assert_eq!(resumed.open_conflicts.len(), 1);
    }

    #[test]
    fn test_stale_pending_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let lockfile = dir.path().join("preflight.lock");
        let result = partial();
        save(&lockfile, &result).unwrap();

        let moved_on = result
            .remote
            .record("brew:rg", "14.0", Provenance::new("B", "desk", Utc::now()));
        assert!(resume(&lockfile, "A", &result.local, &moved_on)
            .unwrap()
            .is_none());
        assert!(!pending_path(&lockfile).exists());
    }

    #[test]
    fn test_clear_missing_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let lockfile = dir.path().join("preflight.lock");
        assert!(!clear(&lockfile).unwrap());
        assert!(load(&lockfile).unwrap().is_none());
    }
}
