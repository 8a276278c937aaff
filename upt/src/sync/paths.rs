//! Canonical relative paths: `/`-joined UTF-8 segments, `""` for the root.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is outside the sync root: {0}")]
    OutsideRoot(String),
    #[error("path contains unsupported component: {0}")]
    UnsupportedComponent(String),
    #[error("path segment is not valid unicode: {0}")]
    NonUnicode(String),
    #[error("invalid path segment {0:?}")]
    InvalidSegment(String),
}

/// Maps a local path under `root` to its canonical relative path.
pub fn relative_from_local(root: &Path, path: &Path) -> Result<String, PathError> {
    let rest = path
        .strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot(path.display().to_string()))?;
    let mut segments = Vec::new();
    for component in rest.components() {
        match component {
            Component::Normal(part) => {
                let segment = part
                    .to_str()
                    .ok_or_else(|| PathError::NonUnicode(part.to_string_lossy().into_owned()))?;
                segments.push(segment);
            }
            Component::CurDir => continue,
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::UnsupportedComponent(
                    path.display().to_string(),
                ));
            }
        }
    }
    Ok(segments.join("/"))
}

/// Maps a canonical relative path under the local `root`.
pub fn local_path_for(root: &Path, rel: &str) -> Result<PathBuf, PathError> {
    validate_relative(rel)?;
    let mut out = root.to_path_buf();
    for segment in segments(rel) {
        out.push(segment);
    }
    Ok(out)
}

/// Joins a canonical relative path onto a `/`-separated remote root.
pub fn remote_path_for(remote_root: &str, rel: &str) -> String {
    let base = remote_root.trim_end_matches('/');
    if rel.is_empty() {
        return if base.is_empty() || base.ends_with(':') {
            format!("{base}/")
        } else {
            base.to_string()
        };
    }
    format!("{base}/{rel}")
}

/// Directories above `remote_root`, outermost first.
///
/// `"/a/b/c"` yields `["/a", "/a/b"]`; `"disk:/x/y"` yields `["disk:/x"]`.
pub fn remote_ancestors(remote_root: &str) -> Vec<String> {
    let (prefix, rest) = match remote_root.find(":/") {
        Some(idx) => remote_root.split_at(idx + 2),
        None if remote_root.starts_with('/') => remote_root.split_at(1),
        None => ("", remote_root),
    };
    let parts: Vec<&str> = rest.split('/').filter(|part| !part.is_empty()).collect();
    let mut out = Vec::new();
    let mut current = prefix.to_string();
    for part in parts.iter().take(parts.len().saturating_sub(1)) {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(part);
        out.push(current.clone());
    }
    out
}

pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Splits a file's relative path into its directory and name.
pub fn split(rel: &str) -> (&str, &str) {
    rel.rsplit_once('/').unwrap_or(("", rel))
}

/// Number of segments; the root has depth 0.
pub fn depth(rel: &str) -> usize {
    segments(rel).count()
}

fn segments(rel: &str) -> impl Iterator<Item = &str> {
    rel.split('/').filter(|segment| !segment.is_empty())
}

pub fn validate_segment(name: &str) -> Result<(), PathError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(PathError::InvalidSegment(name.to_string()));
    }
    Ok(())
}

pub fn validate_relative(rel: &str) -> Result<(), PathError> {
    if rel.is_empty() {
        return Ok(());
    }
    rel.split('/').try_for_each(validate_segment)
}
