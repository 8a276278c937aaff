//! The capability surface the sync engine needs from a remote file store.

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("remote path not found: {0}")]
    NotFound(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("store connection is closed")]
    Closed,
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("remote path conflicts with an existing entry: {0}")]
    Conflict(String),
    #[error("remote operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Transport-level failures; fatal to the current call.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            StoreError::Request(_) | StoreError::Connection(_) | StoreError::Closed
        )
    }

    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            StoreError::Api { status, .. } => Some(classify_api_status(*status)),
            StoreError::Request(_) | StoreError::Connection(_) => Some(ApiErrorClass::Transient),
            _ => None,
        }
    }

    /// Whether a caller-owned retry policy may reasonably try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }
}

pub(crate) fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_EARLY)
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a remote directory listing. `name` is a bare file name, not a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size: Some(size),
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Dir,
            size: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// `.` and `..` as returned by FTP-style listings.
    pub fn is_self_or_parent(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Remote store primitives. Paths are `/`-joined remote paths.
///
/// Implementations own transport concerns (authentication, timeouts);
/// nothing here retries.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_entries(&self, path: &str) -> Result<Vec<RemoteEntry>, StoreError>;

    /// Creates `path`; an existing directory is not an error.
    async fn make_directory(&self, path: &str) -> Result<(), StoreError>;

    /// Creates or overwrites the file at `path`.
    async fn store_file(&self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Fails with [`StoreError::NotFound`] when `path` is absent.
    async fn delete_file(&self, path: &str) -> Result<(), StoreError>;

    /// Removes an empty directory.
    async fn remove_directory(&self, path: &str) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError>;

    /// Size of the entry at `path`, looked up through its parent's listing.
    async fn entry_size(&self, path: &str) -> Result<Option<u64>, StoreError> {
        let trimmed = path.trim_end_matches('/');
        let Some((parent, name)) = trimmed.rsplit_once('/') else {
            return Err(StoreError::NotFound(path.to_string()));
        };
        // "/a" and "disk:/a" both have their parent at the root.
        let parent = if parent.is_empty() || parent.ends_with(':') {
            format!("{parent}/")
        } else {
            parent.to_string()
        };
        let entries = self.list_entries(&parent).await?;
        entries
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.size)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        assert_eq!(
            classify_api_status(StatusCode::UNAUTHORIZED),
            ApiErrorClass::Auth
        );
        assert_eq!(
            classify_api_status(StatusCode::TOO_MANY_REQUESTS),
            ApiErrorClass::RateLimit
        );
        assert_eq!(
            classify_api_status(StatusCode::BAD_GATEWAY),
            ApiErrorClass::Transient
        );
        assert_eq!(
            classify_api_status(StatusCode::BAD_REQUEST),
            ApiErrorClass::Permanent
        );
    }

    #[test]
    fn not_found_is_neither_connection_nor_retryable() {
        let err = StoreError::NotFound("/a".into());
        assert!(err.is_not_found());
        assert!(!err.is_connection());
        assert!(!err.is_retryable());
    }

    #[test]
    fn connection_errors_are_retryable() {
        let err = StoreError::Connection("reset by peer".into());
        assert!(err.is_connection());
        assert!(err.is_retryable());
        assert!(StoreError::Closed.is_connection());
        assert!(!StoreError::Closed.is_retryable());
    }

    #[test]
    fn dot_entries_are_recognized() {
        assert!(RemoteEntry::dir(".").is_self_or_parent());
        assert!(RemoteEntry::dir("..").is_self_or_parent());
        assert!(!RemoteEntry::dir("...").is_self_or_parent());
        assert!(!RemoteEntry::file(".hidden", 1).is_self_or_parent());
    }
}
