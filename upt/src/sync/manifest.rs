//! The persisted record of what the engine last synchronized.

use thiserror::Error;
use tracing::{debug, warn};
use upt_core::RemoteStore;

use super::engine::SyncError;
use super::paths::{self, PathError};
use super::snapshot::Snapshot;

/// Reserved file name at the remote root holding the manifest.
pub const MANIFEST_NAME: &str = ".upt-manifest.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("manifest names an invalid path: {0}")]
    InvalidPath(#[from] PathError),
}

pub fn manifest_path(remote_root: &str) -> String {
    paths::remote_path_for(remote_root, MANIFEST_NAME)
}

pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, ManifestError> {
    Ok(serde_json::to_vec_pretty(snapshot)?)
}

/// Parses a manifest, rejecting keys that are not canonical relative paths.
pub fn decode(bytes: &[u8]) -> Result<Snapshot, ManifestError> {
    let snapshot: Snapshot = serde_json::from_slice(bytes)?;
    for (dir, files) in snapshot.dirs() {
        paths::validate_relative(dir)?;
        for name in files.keys() {
            paths::validate_segment(name)?;
        }
    }
    Ok(snapshot)
}

/// Reads the manifest under `remote_root`.
///
/// A missing manifest means first sync. An unreadable one is treated the
/// same way: re-uploading is safe, deleting from a bad record is not.
pub async fn load_manifest<S>(store: &S, remote_root: &str) -> Result<Snapshot, SyncError>
where
    S: RemoteStore + ?Sized,
{
    let path = manifest_path(remote_root);
    let bytes = match store.read_file(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.is_not_found() => {
            debug!(path = %path, "no manifest yet");
            return Ok(Snapshot::new());
        }
        Err(err) => return Err(err.into()),
    };
    match decode(&bytes) {
        Ok(snapshot) => Ok(snapshot),
        Err(err) => {
            warn!(
                path = %path,
                error = %err,
                "ignoring unusable manifest; no deletes until it is rewritten"
            );
            Ok(Snapshot::new())
        }
    }
}

pub async fn save_manifest<S>(
    store: &S,
    snapshot: &Snapshot,
    remote_root: &str,
) -> Result<(), SyncError>
where
    S: RemoteStore + ?Sized,
{
    let bytes = encode(snapshot)?;
    store.store_file(&manifest_path(remote_root), bytes).await?;
    Ok(())
}
