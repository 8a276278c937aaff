//! Reconciliation planning: manifest vs local tree, with remote directory
//! existence folded in.

use std::collections::BTreeSet;

use super::paths;
use super::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateDir(String),
    Upload(String),
    Delete(String),
    /// Drop a tracked directory that is gone locally, if nothing untracked lives in it.
    RemoveDir(String),
}

impl Action {
    pub fn path(&self) -> &str {
        match self {
            Action::CreateDir(path)
            | Action::Upload(path)
            | Action::Delete(path)
            | Action::RemoveDir(path) => path,
        }
    }

    fn sort_key(&self) -> (u8, i64, &str) {
        let path = self.path();
        let depth = paths::depth(path) as i64;
        match self {
            Action::Delete(_) => (0, 0, path),
            Action::RemoveDir(_) => (1, -depth, path),
            Action::CreateDir(_) => (2, depth, path),
            Action::Upload(_) => (3, 0, path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<Action>,
    /// What the manifest becomes once every action succeeded.
    pub manifest: Snapshot,
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Diffs the manifest against the local tree.
///
/// Only paths the manifest knows can be deleted; the next manifest is the
/// local snapshot as-is.
pub fn diff(manifest: &Snapshot, local: &Snapshot) -> Plan {
    let mut actions = Vec::new();

    for (dir, files) in local.dirs() {
        if !manifest.contains_dir(dir) {
            actions.push(Action::CreateDir(dir.to_string()));
        }
        for (name, meta) in files {
            let changed = match manifest.file(dir, name) {
                Some(previous) => meta.differs_from(previous),
                None => true,
            };
            if changed {
                actions.push(Action::Upload(paths::join(dir, name)));
            }
        }
    }

    for (dir, files) in manifest.dirs() {
        for name in files.keys() {
            if local.file(dir, name).is_none() {
                actions.push(Action::Delete(paths::join(dir, name)));
            }
        }
        if !dir.is_empty() && !local.contains_dir(dir) {
            actions.push(Action::RemoveDir(dir.to_string()));
        }
    }

    sort_actions(&mut actions);
    Plan {
        actions,
        manifest: local.clone(),
    }
}

/// [`diff`], with directory creation and removal checked against the
/// current remote tree.
///
/// Every local directory missing remotely gets created, including tracked
/// ones removed out of band; removals of directories already gone are
/// dropped. Deletes are left alone, a missing file is a no-op when applied.
pub fn plan(manifest: &Snapshot, local: &Snapshot, remote: &Snapshot) -> Plan {
    let mut plan = diff(manifest, local);
    plan.actions.retain(|action| match action {
        Action::CreateDir(_) => false,
        Action::RemoveDir(dir) => remote.contains_dir(dir),
        Action::Upload(_) | Action::Delete(_) => true,
    });
    let missing: BTreeSet<&str> = local
        .dirs()
        .map(|(dir, _)| dir)
        .filter(|dir| !remote.contains_dir(dir))
        .collect();
    plan.actions
        .extend(missing.into_iter().map(|dir| Action::CreateDir(dir.to_string())));
    sort_actions(&mut plan.actions);
    plan
}

/// Deletes first, then directory removals deepest first, then directory
/// creation shallowest first, then uploads.
pub fn sort_actions(actions: &mut [Action]) {
    actions.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
