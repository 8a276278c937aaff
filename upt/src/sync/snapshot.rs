use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::paths;

/// How a local file is judged changed against the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChangeDetection {
    /// Size mismatch only; same-size rewrites go unnoticed.
    #[default]
    Size,
    /// Size, or modification time when both sides recorded one.
    SizeAndModified,
}

impl FromStr for ChangeDetection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "size" => Ok(Self::Size),
            "size-and-mtime" | "mtime" => Ok(Self::SizeAndModified),
            other => Err(format!("unknown change detection policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub size: u64,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
}

impl FileMeta {
    pub fn sized(size: u64) -> Self {
        Self {
            size,
            modified: None,
        }
    }

    pub fn differs_from(&self, previous: &FileMeta) -> bool {
        if self.size != previous.size {
            return true;
        }
        matches!((self.modified, previous.modified), (Some(now), Some(then)) if now != then)
    }
}

pub type DirFiles = BTreeMap<String, FileMeta>;

/// Directory relative path -> file name -> metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    dirs: BTreeMap<String, DirFiles>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn insert_dir(&mut self, dir: impl Into<String>) {
        self.dirs.entry(dir.into()).or_default();
    }

    pub fn insert_file(&mut self, dir: impl Into<String>, name: impl Into<String>, meta: FileMeta) {
        self.dirs
            .entry(dir.into())
            .or_default()
            .insert(name.into(), meta);
    }

    pub fn contains_dir(&self, dir: &str) -> bool {
        self.dirs.contains_key(dir)
    }

    pub fn files(&self, dir: &str) -> Option<&DirFiles> {
        self.dirs.get(dir)
    }

    pub fn file(&self, dir: &str, name: &str) -> Option<&FileMeta> {
        self.dirs.get(dir).and_then(|files| files.get(name))
    }

    /// Looks a file up by its full relative path.
    pub fn file_at(&self, rel: &str) -> Option<&FileMeta> {
        let (dir, name) = paths::split(rel);
        self.file(dir, name)
    }

    pub fn dirs(&self) -> impl Iterator<Item = (&str, &DirFiles)> {
        self.dirs.iter().map(|(dir, files)| (dir.as_str(), files))
    }

    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn file_count(&self) -> usize {
        self.dirs.values().map(BTreeMap::len).sum()
    }
}
