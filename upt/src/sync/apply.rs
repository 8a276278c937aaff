use std::path::Path;

use tracing::debug;
use upt_core::RemoteStore;

use super::diff::Action;
use super::engine::SyncError;
use super::paths;

/// What one apply pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created_dirs: usize,
    pub uploaded: usize,
    pub deleted: usize,
    /// Deletes whose target was already gone remotely.
    pub already_absent: usize,
    pub removed_dirs: usize,
    /// Directories left in place because they still hold untracked entries.
    pub kept_dirs: usize,
}

impl SyncReport {
    /// Uploads plus deletes that actually removed something.
    pub fn changes(&self) -> usize {
        self.uploaded + self.deleted
    }
}

/// Executes `actions` in order; the first failure aborts the rest.
pub async fn apply<S>(
    store: &S,
    actions: &[Action],
    local_root: &Path,
    remote_root: &str,
) -> Result<SyncReport, SyncError>
where
    S: RemoteStore + ?Sized,
{
    let mut report = SyncReport::default();
    for action in actions {
        let remote = paths::remote_path_for(remote_root, action.path());
        match action {
            Action::CreateDir(_) => {
                store.make_directory(&remote).await?;
                debug!(path = %remote, "directory ensured");
                report.created_dirs += 1;
            }
            Action::Upload(rel) => {
                let source = paths::local_path_for(local_root, rel)?;
                let bytes = tokio::fs::read(&source)
                    .await
                    .map_err(|err| SyncError::Filesystem {
                        path: source.clone(),
                        source: err,
                    })?;
                let size = bytes.len();
                store.store_file(&remote, bytes).await?;
                debug!(path = %remote, size, "uploaded");
                report.uploaded += 1;
            }
            Action::Delete(_) => match store.delete_file(&remote).await {
                Ok(()) => {
                    debug!(path = %remote, "deleted");
                    report.deleted += 1;
                }
                Err(err) if err.is_not_found() => {
                    debug!(path = %remote, "already absent remotely");
                    report.already_absent += 1;
                }
                Err(err) => return Err(err.into()),
            },
            Action::RemoveDir(_) => {
                if remove_if_empty(store, &remote).await? {
                    report.removed_dirs += 1;
                } else {
                    report.kept_dirs += 1;
                }
            }
        }
    }
    Ok(report)
}

async fn remove_if_empty<S>(store: &S, remote: &str) -> Result<bool, SyncError>
where
    S: RemoteStore + ?Sized,
{
    let entries = match store.list_entries(remote).await {
        Ok(entries) => entries,
        Err(err) if err.is_not_found() => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    if entries.iter().any(|entry| !entry.is_self_or_parent()) {
        debug!(path = %remote, "keeping directory with untracked entries");
        return Ok(false);
    }
    match store.remove_directory(remote).await {
        Ok(()) => {
            debug!(path = %remote, "directory removed");
            Ok(true)
        }
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err.into()),
    }
}
