//! In-memory remote store for testing.
//!
//! Keeps a directory tree keyed by remote path, lets tests mutate it out of
//! band and inject connection failures. Clones share state.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::store::{RemoteEntry, RemoteStore, StoreError};

/// Store primitive targeted by [`MemoryStore::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    MakeDirectory,
    StoreFile,
    ReadFile,
    DeleteFile,
    RemoveDirectory,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug)]
struct MemoryStoreInner {
    nodes: BTreeMap<String, Node>,
    closed: bool,
    writes: Vec<String>,
    fail_next: HashMap<StoreOp, String>,
}

impl Default for MemoryStoreInner {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir);
        Self {
            nodes,
            closed: false,
            writes: Vec::new(),
            fail_next: HashMap::new(),
        }
    }
}

impl MemoryStoreInner {
    fn check(&mut self, op: StoreOp) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if let Some(message) = self.fail_next.remove(&op) {
            return Err(StoreError::Connection(message));
        }
        Ok(())
    }

    fn require_parent_dir(&self, path: &str) -> Result<(), StoreError> {
        let parent = parent_of(path);
        match self.nodes.get(&parent) {
            Some(Node::Dir) => Ok(()),
            Some(Node::File(_)) => Err(StoreError::Conflict(parent)),
            None => Err(StoreError::NotFound(parent)),
        }
    }

    fn children(&self, dir: &str) -> Vec<(String, &Node)> {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, node)| {
                let rest = &key[prefix.len()..];
                (!rest.is_empty() && !rest.contains('/')).then(|| (rest.to_string(), node))
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        // A panicking test must not poison the store for the others sharing it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cause the next call of `op` to fail with a connection error.
    pub fn fail_next(&self, op: StoreOp, message: &str) {
        self.lock().fail_next.insert(op, message.to_string());
    }

    /// Write a file out of band, creating missing parent directories.
    pub fn put_file(&self, path: &str, bytes: &[u8]) {
        let path = normalize(path);
        let mut inner = self.lock();
        for ancestor in ancestors_of(&path) {
            inner.nodes.entry(ancestor).or_insert(Node::Dir);
        }
        inner.nodes.insert(path, Node::File(bytes.to_vec()));
    }

    /// Create a directory chain out of band.
    pub fn put_dir(&self, path: &str) {
        let path = normalize(path);
        let mut inner = self.lock();
        for ancestor in ancestors_of(&path) {
            inner.nodes.entry(ancestor).or_insert(Node::Dir);
        }
        inner.nodes.insert(path, Node::Dir);
    }

    /// Remove a file or a whole directory subtree out of band.
    pub fn remove(&self, path: &str) -> bool {
        let path = normalize(path);
        let prefix = format!("{path}/");
        let mut inner = self.lock();
        inner.nodes.retain(|key, _| !key.starts_with(&prefix));
        inner.nodes.remove(&path).is_some()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.lock().nodes.get(&normalize(path)) {
            Some(Node::File(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.lock().nodes.get(&normalize(path)), Some(Node::Dir))
    }

    /// Paths passed to `store_file`, in call order.
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Accept calls again after `close()`.
    pub fn reopen(&self) {
        self.lock().closed = false;
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_entries(&self, path: &str) -> Result<Vec<RemoteEntry>, StoreError> {
        let path = normalize(path);
        let mut inner = self.lock();
        inner.check(StoreOp::List)?;
        match inner.nodes.get(&path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(StoreError::Conflict(path)),
            None => return Err(StoreError::NotFound(path)),
        }
        // FTP-style listings report the directory itself and its parent.
        let mut entries = vec![RemoteEntry::dir("."), RemoteEntry::dir("..")];
        entries.extend(inner.children(&path).into_iter().map(|(name, node)| match node {
            Node::Dir => RemoteEntry::dir(name),
            Node::File(bytes) => RemoteEntry::file(name, bytes.len() as u64),
        }));
        Ok(entries)
    }

    async fn make_directory(&self, path: &str) -> Result<(), StoreError> {
        let path = normalize(path);
        let mut inner = self.lock();
        inner.check(StoreOp::MakeDirectory)?;
        match inner.nodes.get(&path) {
            Some(Node::Dir) => return Ok(()),
            Some(Node::File(_)) => return Err(StoreError::Conflict(path)),
            None => {}
        }
        inner.require_parent_dir(&path)?;
        inner.nodes.insert(path, Node::Dir);
        Ok(())
    }

    async fn store_file(&self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = normalize(path);
        let mut inner = self.lock();
        inner.check(StoreOp::StoreFile)?;
        if matches!(inner.nodes.get(&path), Some(Node::Dir)) {
            return Err(StoreError::Conflict(path));
        }
        inner.require_parent_dir(&path)?;
        inner.writes.push(path.clone());
        inner.nodes.insert(path, Node::File(bytes));
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let path = normalize(path);
        let mut inner = self.lock();
        inner.check(StoreOp::ReadFile)?;
        match inner.nodes.get(&path) {
            Some(Node::File(bytes)) => Ok(bytes.clone()),
            Some(Node::Dir) => Err(StoreError::Conflict(path)),
            None => Err(StoreError::NotFound(path)),
        }
    }

    async fn delete_file(&self, path: &str) -> Result<(), StoreError> {
        let path = normalize(path);
        let mut inner = self.lock();
        inner.check(StoreOp::DeleteFile)?;
        match inner.nodes.get(&path) {
            Some(Node::File(_)) => {
                inner.nodes.remove(&path);
                Ok(())
            }
            Some(Node::Dir) => Err(StoreError::Conflict(path)),
            None => Err(StoreError::NotFound(path)),
        }
    }

    async fn remove_directory(&self, path: &str) -> Result<(), StoreError> {
        let path = normalize(path);
        let mut inner = self.lock();
        inner.check(StoreOp::RemoveDirectory)?;
        match inner.nodes.get(&path) {
            Some(Node::Dir) if path != "/" && inner.children(&path).is_empty() => {
                inner.nodes.remove(&path);
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict(path)),
            None => Err(StoreError::NotFound(path)),
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(message) = inner.fail_next.remove(&StoreOp::Close) {
            return Err(StoreError::Connection(message));
        }
        inner.closed = true;
        Ok(())
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

fn ancestors_of(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = parent_of(path);
    while current != "/" {
        let next = parent_of(&current);
        out.push(current);
        current = next;
    }
    out.reverse();
    out
}
