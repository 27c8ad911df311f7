//! Retrieval of the remote peer's lockfile snapshot.
//!
//! The engine never performs I/O itself; a [`RemoteSource`] reads the peer's
//! bytes into memory first. Two sources exist: an explicit file (useful for
//! tests and ad-hoc comparisons) and the remote-tracking branch of the git
//! repository the lockfile lives in, read via `git2` without touching the
//! working tree. Fetching from the network is left to the user's `git fetch`.

use std::path::{Path, PathBuf};

use git2::{ErrorCode, Repository};
use tracing::{debug, info, instrument};

use crate::errors::{CoreError, RemoteError};
use crate::lockfile::{store, LockfileState};

/// Something that can produce the remote peer's lockfile bytes.
pub trait RemoteSource {
    /// Human-readable origin, for messages.
    fn describe(&self) -> String;

    /// Read the snapshot bytes. `Ok(None)` means the peer has never
    /// published a lockfile.
    fn fetch(&self) -> Result<Option<Vec<u8>>, RemoteError>;
}

/// Load and parse the remote snapshot, if there is one.
pub fn fetch_state(source: &dyn RemoteSource) -> Result<Option<LockfileState>, CoreError> {
    match source.fetch()? {
        Some(bytes) => Ok(Some(store::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// A remote snapshot stored in a plain file.
#[derive(Debug, Clone)]
pub struct FileRemote {
    path: PathBuf,
}

impl FileRemote {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RemoteSource for FileRemote {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<Option<Vec<u8>>, RemoteError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Git remote-tracking branch
// ---------------------------------------------------------------------------

/// The lockfile as committed on `refs/remotes/<remote>/<branch>`.
#[derive(Debug, Clone)]
pub struct GitRemote {
    lockfile: PathBuf,
    remote: String,
    branch: String,
}

impl GitRemote {
    pub fn new<P: AsRef<Path>>(
        lockfile: P,
        remote: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            lockfile: lockfile.as_ref().to_path_buf(),
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    fn refname(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }

    /// Directory containing the lockfile, resolved through symlinks.
    fn lockfile_dir(&self) -> Result<PathBuf, RemoteError> {
        let parent = match self.lockfile.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(parent.canonicalize()?)
    }

    /// Lockfile path relative to the repository work tree.
    fn path_in_repo(&self, repo: &Repository) -> Result<PathBuf, RemoteError> {
        let workdir = repo
            .workdir()
            .ok_or_else(|| RemoteError::RepositoryNotFound(self.lockfile.display().to_string()))?
            .canonicalize()?;
        let dir = self.lockfile_dir()?;
        let relative_dir = dir
            .strip_prefix(&workdir)
            .map_err(|_| RemoteError::RepositoryNotFound(self.lockfile.display().to_string()))?;
        let file_name = self
            .lockfile
            .file_name()
            .ok_or_else(|| RemoteError::RepositoryNotFound(self.lockfile.display().to_string()))?;
        Ok(relative_dir.join(file_name))
    }
}

impl RemoteSource for GitRemote {
    fn describe(&self) -> String {
        format!("{}/{}:{}", self.remote, self.branch, self.lockfile.display())
    }

    #[instrument(skip(self), fields(remote = %self.remote, branch = %self.branch))]
    fn fetch(&self) -> Result<Option<Vec<u8>>, RemoteError> {
        let dir = self.lockfile_dir()?;
        let repo = Repository::discover(&dir)
            .map_err(|_| RemoteError::RepositoryNotFound(dir.display().to_string()))?;
        let rel = self.path_in_repo(&repo)?;

        let reference = match repo.find_reference(&self.refname()) {
            Ok(r) => r,
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(refname = %self.refname(), "remote-tracking ref not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let tree = reference.peel_to_tree()?;

        let entry = match tree.get_path(&rel) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(path = %rel.display(), "lockfile not present on remote");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let blob = entry.to_object(&repo)?.peel_to_blob()?;

        info!(path = %rel.display(), bytes = blob.content().len(), "read remote lockfile");
        Ok(Some(blob.content().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;

    /// Commit `files` on a fresh repo and point `refs/remotes/origin/main`
    /// at the commit.
    fn repo_with_remote(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let mut index = repo.index().unwrap();
        for (name, contents) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, contents).unwrap();
            index.add_path(Path::new(name)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("T", "t@t.com").unwrap();
        let oid = repo.commit(None, &sig, &sig, "lock", &tree, &[]).unwrap();
        repo.reference("refs/remotes/origin/main", oid, true, "test")
            .unwrap();
        dir
    }

    #[test]
    fn test_reads_lockfile_from_tracking_branch() {
        let dir = repo_with_remote(&[("preflight.lock", "{\"entries\":{}}")]);
        // Local copy differs; the remote bytes must come from the ref.
        std::fs::write(dir.path().join("preflight.lock"), "local edits").unwrap();

        let remote = GitRemote::new(dir.path().join("preflight.lock"), "origin", "main");
        let bytes = remote.fetch().unwrap().expect("remote lockfile");
        assert_eq!(bytes, b"{\"entries\":{}}");
    }

    #[test]
    fn test_nested_lockfile_path() {
        let dir = repo_with_remote(&[("machines/work/preflight.lock", "nested")]);
        let remote = GitRemote::new(
            dir.path().join("machines/work/preflight.lock"),
            "origin",
            "main",
        );
        assert_eq!(remote.fetch().unwrap().as_deref(), Some(&b"nested"[..]));
    }

    #[test]
    fn test_missing_ref_is_none() {
        let dir = repo_with_remote(&[("preflight.lock", "{}")]);
        let remote = GitRemote::new(dir.path().join("preflight.lock"), "origin", "develop");
        assert!(remote.fetch().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_on_remote_is_none() {
        let dir = repo_with_remote(&[("README", "hi")]);
        let remote = GitRemote::new(dir.path().join("preflight.lock"), "origin", "main");
        assert!(remote.fetch().unwrap().is_none());
    }

    #[test]
    fn test_file_remote() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote.lock");
        assert!(FileRemote::new(&path).fetch().unwrap().is_none());

        std::fs::write(&path, "{\"entries\":{},\"clock\":{\"B\":2}}").unwrap();
        let state = fetch_state(&FileRemote::new(&path)).unwrap().unwrap();
        assert_eq!(state.clock().get("B"), 2);
    }
}
