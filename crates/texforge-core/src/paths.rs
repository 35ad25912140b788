//! Cache directory management.
//!
//! Provides the on-disk layout shared by the artifact store and the
//! workspace manager, rooted at an injected path:
//!
//! ```text
//! <root>/
//! ├── environments/ # One precompiled format per preamble hash
//! ├── scratch/      # Private build directories (removed after each build)
//! └── workspaces/   # Durable per-document dirs + transient ephemeral ones
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Directory structure below a cache root.
#[derive(Debug, Clone)]
pub struct CacheDirs {
    /// The cache root itself.
    pub root: PathBuf,

    /// Canonical location of precompiled environments.
    pub environments_dir: PathBuf,

    /// Parent of private scratch build directories.
    pub scratch_dir: PathBuf,

    /// Parent of all job workspaces.
    pub workspaces_dir: PathBuf,
}

impl CacheDirs {
    /// Create the layout below `root`.
    ///
    /// Creates all necessary directories if they don't exist.
    ///
    /// # Errors
    /// Returns an error if directory creation fails.
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let dirs = Self {
            environments_dir: root.join("environments"),
            scratch_dir: root.join("scratch"),
            workspaces_dir: root.join("workspaces"),
            root,
        };
        dirs.create()?;
        Ok(dirs)
    }

    /// Default cache root: the platform cache directory, or `./.texforge`.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .map(|dir| dir.join("texforge"))
            .unwrap_or_else(|| PathBuf::from(".texforge"))
    }

    fn create(&self) -> Result<()> {
        for dir in [&self.environments_dir, &self.scratch_dir, &self.workspaces_dir] {
            fs::create_dir_all(dir).map_err(Error::at(dir))?;
        }
        Ok(())
    }
}
