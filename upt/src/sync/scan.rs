use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use upt_core::RemoteStore;
use walkdir::WalkDir;

use super::engine::SyncError;
use super::manifest::MANIFEST_NAME;
use super::paths::{self, PathError};
use super::snapshot::{ChangeDetection, FileMeta, Snapshot};

/// Walks the local tree under `root`.
///
/// Every directory is present, empty ones included, so directory creation
/// can be diffed. Symlinks are not followed.
pub fn scan_local(root: &Path, detection: ChangeDetection) -> Result<Snapshot, SyncError> {
    let meta = std::fs::metadata(root).map_err(|source| SyncError::Filesystem {
        path: root.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(SyncError::Filesystem {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotADirectory, "local root is not a directory"),
        });
    }

    let mut snapshot = Snapshot::new();
    snapshot.insert_dir("");
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry?;
        let rel = match paths::relative_from_local(root, entry.path()) {
            Ok(rel) => rel,
            Err(PathError::NonUnicode(name)) => {
                warn!(
                    path = %entry.path().display(),
                    name = %name,
                    "skipping entry with non-unicode name"
                );
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            snapshot.insert_dir(rel);
        } else if file_type.is_file() {
            if rel == MANIFEST_NAME {
                warn!(
                    path = %entry.path().display(),
                    "skipping local file named like the manifest"
                );
                continue;
            }
            let meta = entry.metadata()?;
            let modified = match detection {
                ChangeDetection::Size => None,
                ChangeDetection::SizeAndModified => meta.modified().ok().and_then(unix_seconds),
            };
            let (dir, name) = paths::split(&rel);
            snapshot.insert_file(
                dir,
                name,
                FileMeta {
                    size: meta.len(),
                    modified,
                },
            );
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }
    Ok(snapshot)
}

/// Whole seconds relative to the epoch; `None` when out of `i64` range.
fn unix_seconds(time: SystemTime) -> Option<i64> {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).ok(),
        Err(before) => i64::try_from(before.duration().as_secs())
            .ok()
            .map(|secs| -secs),
    }
}

/// Lists the remote tree under `root` with an explicit worklist.
///
/// A missing root yields an empty snapshot without a `""` entry. The
/// manifest file is not reported.
pub async fn scan_remote<S>(store: &S, root: &str) -> Result<Snapshot, SyncError>
where
    S: RemoteStore + ?Sized,
{
    let mut snapshot = Snapshot::new();
    let mut pending = vec![String::new()];
    while let Some(dir) = pending.pop() {
        let remote = paths::remote_path_for(root, &dir);
        let entries = match store.list_entries(&remote).await {
            Ok(entries) => entries,
            Err(err) if err.is_not_found() && dir.is_empty() => {
                debug!(root, "remote root does not exist yet");
                return Ok(snapshot);
            }
            Err(err) => return Err(err.into()),
        };
        snapshot.insert_dir(dir.clone());
        for entry in entries {
            if entry.is_self_or_parent() {
                continue;
            }
            if entry.is_dir() {
                pending.push(paths::join(&dir, &entry.name));
            } else if !(dir.is_empty() && entry.name == MANIFEST_NAME) {
                let meta = FileMeta::sized(entry.size.unwrap_or(0));
                snapshot.insert_file(dir.clone(), entry.name, meta);
            }
        }
    }
    Ok(snapshot)
}
