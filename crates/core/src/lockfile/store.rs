//! JSON persistence for lockfile snapshots.
//!
//! The on-disk document wraps the snapshot with a format version so older
//! binaries refuse files they cannot interpret instead of silently dropping
//! fields.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::state::LockfileState;
use crate::errors::LockfileError;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Default lockfile name, relative to the working directory.
pub const DEFAULT_LOCKFILE: &str = "preflight.lock";

#[derive(Serialize)]
struct DocumentRef<'a> {
    format_version: u32,
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    state: &'a LockfileState,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default = "default_format")]
    format_version: u32,
    #[serde(flatten)]
    state: LockfileState,
}

fn default_format() -> u32 {
    FORMAT_VERSION
}

/// Parse snapshot bytes.
pub fn from_slice(bytes: &[u8]) -> Result<LockfileState, LockfileError> {
    let doc: Document = serde_json::from_slice(bytes)?;
    if doc.format_version > FORMAT_VERSION {
        return Err(LockfileError::UnsupportedFormat {
            found: doc.format_version,
            expected: FORMAT_VERSION,
        });
    }
    debug!(
        entries = doc.state.len(),
        machines = doc.state.clock().len(),
        "parsed lockfile snapshot"
    );
    Ok(doc.state)
}

/// Serialize a snapshot to pretty-printed JSON.
pub fn to_string(state: &LockfileState) -> Result<String, LockfileError> {
    let doc = DocumentRef {
        format_version: FORMAT_VERSION,
        generated_at: Utc::now(),
        state,
    };
    let mut out = serde_json::to_string_pretty(&doc)?;
    out.push('\n');
    Ok(out)
}

/// Load a snapshot from `path`. A missing file yields `Ok(None)`: there is
/// nothing to compare, which is not an error.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<LockfileState>, LockfileError> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "lockfile not present");
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    from_slice(&bytes).map(Some)
}

/// Write a snapshot to `path`, replacing the file atomically.
pub fn save<P: AsRef<Path>>(path: P, state: &LockfileState) -> Result<(), LockfileError> {
    let path = path.as_ref();
    let contents = to_string(state)?;

    let tmp = path.with_extension("lock.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;

    info!(path = %path.display(), entries = state.len(), "lockfile written");
    Ok(())
}
