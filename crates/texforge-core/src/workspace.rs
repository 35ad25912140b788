//! Workspace lifecycle for compilation jobs.
//!
//! A job either runs in an anonymous ephemeral directory that is removed
//! when the job ends, or in a durable directory keyed by a document
//! identifier that survives across jobs (engines reuse `.aux`/`.toc` state
//! from previous runs there).
//!
//! Jobs sharing a document identifier are serialised: a durable workspace is
//! held exclusively from [`WorkspaceManager::acquire`] until the returned
//! [`Workspace`] is released or dropped.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::TempDir;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

use crate::error::{Error, Result};
use crate::paths::CacheDirs;

/// Longest accepted document identifier.
pub const MAX_DOCUMENT_ID_LEN: usize = 128;

/// Caller-supplied identifier of a durable workspace.
///
/// Restricted to `[A-Za-z0-9_.-]`, not starting with `.`, so it is always a
/// single path component inside the workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(String);

impl DocumentId {
    /// Validate and wrap an identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= MAX_DOCUMENT_ID_LEN
            && !id.starts_with('.')
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'));
        if valid {
            Ok(Self(id))
        } else {
            Err(Error::InvalidDocumentId(id))
        }
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type LockTable = Mutex<HashMap<DocumentId, Arc<TokioMutex<()>>>>;

/// Allocates and releases job workspaces below a root directory.
pub struct WorkspaceManager {
    root: PathBuf,
    locks: Arc<LockTable>,
}

impl WorkspaceManager {
    /// Create a manager over an existing cache layout.
    pub fn new(dirs: &CacheDirs) -> Self {
        Self {
            root: dirs.workspaces_dir.clone(),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Root directory of all workspaces.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the durable workspace for `id` (whether or not it exists yet).
    pub fn durable_path(&self, id: &DocumentId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Acquire a workspace.
    ///
    /// With an identifier, waits for any other job on the same identifier to
    /// release it, then returns the durable directory (created on first use).
    /// Without one, returns a fresh empty ephemeral directory.
    pub async fn acquire(&self, document_id: Option<&DocumentId>) -> Result<Workspace> {
        let Some(id) = document_id else {
            let dir = tempfile::Builder::new()
                .prefix(".job-")
                .tempdir_in(&self.root)
                .map_err(Error::at(&self.root))?;
            tracing::debug!(path = %dir.path().display(), "acquired ephemeral workspace");
            return Ok(Workspace {
                path: dir.path().to_path_buf(),
                kind: WorkspaceKind::Ephemeral(dir),
            });
        };

        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(id.clone()).or_default().clone()
        };
        let lease = DurableLease {
            id: id.clone(),
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
        };

        let path = self.durable_path(id);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(Error::at(&path))?;
        tracing::debug!(document_id = %id, path = %path.display(), "acquired durable workspace");

        Ok(Workspace {
            path,
            kind: WorkspaceKind::Durable(lease),
        })
    }

    /// Number of document identifiers with a job holding or awaiting their workspace.
    pub fn active_documents(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl fmt::Debug for WorkspaceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceManager")
            .field("root", &self.root)
            .field("active_documents", &self.active_documents())
            .finish()
    }
}

/// A job's working directory.
///
/// Dropping an ephemeral workspace deletes it, so cleanup also happens on
/// error, timeout and cancellation paths.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    kind: WorkspaceKind,
}

#[derive(Debug)]
enum WorkspaceKind {
    Ephemeral(TempDir),
    Durable(DurableLease),
}

impl Workspace {
    /// Directory the engine runs in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the directory is deleted on release.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self.kind, WorkspaceKind::Ephemeral(_))
    }

    /// Identifier of a durable workspace.
    pub fn document_id(&self) -> Option<&DocumentId> {
        match &self.kind {
            WorkspaceKind::Ephemeral(_) => None,
            WorkspaceKind::Durable(lease) => Some(&lease.id),
        }
    }

    /// Release the workspace: delete it if ephemeral, unlock it if durable.
    pub fn release(self) -> Result<()> {
        match self.kind {
            WorkspaceKind::Ephemeral(dir) => {
                tracing::debug!(path = %self.path.display(), "removing ephemeral workspace");
                dir.close().map_err(Error::at(self.path))
            }
            WorkspaceKind::Durable(lease) => {
                drop(lease);
                Ok(())
            }
        }
    }
}

/// Exclusive hold on a durable workspace.
struct DurableLease {
    id: DocumentId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
}

impl fmt::Debug for DurableLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableLease").field("id", &self.id).finish()
    }
}

impl Drop for DurableLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the table still references an idle lock; waiters hold clones.
        let idle = locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.id);
        }
    }
}
