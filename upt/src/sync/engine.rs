use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use upt_core::{ConnectionParams, DiskClient, RemoteStore, StoreError};

use super::apply::{SyncReport, apply};
use super::diff::plan;
use super::manifest::{ManifestError, load_manifest, save_manifest};
use super::paths::{self, PathError};
use super::scan::{scan_local, scan_remote};
use super::snapshot::{ChangeDetection, Snapshot};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("local scan task failed: {0}")]
    ScanTask(#[from] tokio::task::JoinError),
    #[error("{changes} change(s) applied but the manifest was not saved: {source}")]
    ManifestNotPersisted {
        changes: usize,
        #[source]
        source: Box<SyncError>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub change_detection: ChangeDetection,
}

/// Mirrors `local_root` onto `remote_root` once.
///
/// Only files recorded in the remote manifest are ever deleted. The manifest
/// is rewritten only after every action succeeded; on failure the completed
/// actions stand and the next call picks up the rest.
pub async fn update<S>(
    store: &S,
    local_root: &Path,
    remote_root: &str,
    options: SyncOptions,
) -> Result<SyncReport, SyncError>
where
    S: RemoteStore + ?Sized,
{
    let local_task = {
        let root = local_root.to_path_buf();
        let detection = options.change_detection;
        tokio::task::spawn_blocking(move || scan_local(&root, detection))
    };
    let (local, remote) = tokio::join!(local_task, scan_remote(store, remote_root));
    let local = local??;
    let remote = remote?;

    let manifest = if remote.contains_dir("") {
        load_manifest(store, remote_root).await?
    } else {
        for ancestor in paths::remote_ancestors(remote_root) {
            store.make_directory(&ancestor).await?;
        }
        debug!(root = remote_root, "remote root missing; starting from an empty manifest");
        Snapshot::new()
    };

    let plan = plan(&manifest, &local, &remote);
    debug!(
        actions = plan.actions.len(),
        local_files = local.file_count(),
        remote_files = remote.file_count(),
        tracked_files = manifest.file_count(),
        "planned sync"
    );

    let report = apply(store, &plan.actions, local_root, remote_root).await?;
    if let Err(err) = save_manifest(store, &plan.manifest, remote_root).await {
        return Err(SyncError::ManifestNotPersisted {
            changes: report.changes(),
            source: Box::new(err),
        });
    }

    info!(
        local = %local_root.display(),
        remote = remote_root,
        changes = report.changes(),
        uploaded = report.uploaded,
        deleted = report.deleted,
        created_dirs = report.created_dirs,
        removed_dirs = report.removed_dirs,
        "sync complete"
    );
    Ok(report)
}

/// Connects a [`DiskClient`], runs [`update`] and closes the client, also
/// when the update fails. Returns the number of changes.
pub async fn update_with_params(
    params: &ConnectionParams,
    local_root: &Path,
    remote_root: &str,
    options: SyncOptions,
) -> Result<usize, SyncError> {
    let client = DiskClient::connect(params)?;
    let result = update(&client, local_root, remote_root, options).await;
    close_store(&client).await;
    Ok(result?.changes())
}

/// Closes `store` once its work is done. A close failure cannot undo what
/// already happened remotely, so it is logged rather than returned.
pub async fn close_store<S>(store: &S)
where
    S: RemoteStore + ?Sized,
{
    if let Err(err) = store.close().await {
        warn!(error = %err, "closing the remote store failed");
    }
}

/// Overwrites the remote manifest without touching anything else.
///
/// With `None`, the manifest is rebuilt from a fresh scan of `local_root`,
/// which declares the current remote content in sync with it.
pub async fn rebuild_manifest<S>(
    store: &S,
    snapshot: Option<Snapshot>,
    local_root: &Path,
    remote_root: &str,
    options: SyncOptions,
) -> Result<Snapshot, SyncError>
where
    S: RemoteStore + ?Sized,
{
    let snapshot = match snapshot {
        Some(snapshot) => snapshot,
        None => {
            let root = local_root.to_path_buf();
            let detection = options.change_detection;
            tokio::task::spawn_blocking(move || scan_local(&root, detection)).await??
        }
    };
    for dir in paths::remote_ancestors(remote_root) {
        store.make_directory(&dir).await?;
    }
    store
        .make_directory(&paths::remote_path_for(remote_root, ""))
        .await?;
    save_manifest(store, &snapshot, remote_root).await?;
    info!(
        remote = remote_root,
        dirs = snapshot.dir_count(),
        files = snapshot.file_count(),
        "manifest rebuilt"
    );
    Ok(snapshot)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
