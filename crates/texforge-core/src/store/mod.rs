//! Content-addressed cache of precompiled environments.
//!
//! An environment is keyed by the hash of its prefix text, so an artifact at
//! the canonical path is never stale and is returned without validation.
//! Builds run in a private scratch directory and are renamed into place;
//! concurrent requests for the same key share one in-flight build.
//!
//! Entries are never evicted. Each one is a pure function of its key, so an
//! operator may delete the directory at any time to reclaim space.

mod key;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::engine::{BuildRequest, EnvironmentBuilder};
use crate::error::{BuildFailure, Error, Result};
use crate::paths::CacheDirs;

pub use key::{BODY_MARKER, EnvironmentKey, KEY_LEN, split_preamble};

type SharedBuild = Shared<BoxFuture<'static, std::result::Result<EnvironmentHandle, BuildFailure>>>;
type InFlight = Arc<Mutex<HashMap<PathBuf, SharedBuild>>>;

/// A ready precompiled environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentHandle {
    key: EnvironmentKey,
    path: PathBuf,
}

impl EnvironmentHandle {
    /// Content key of the prefix this environment was built from.
    pub fn key(&self) -> &EnvironmentKey {
        &self.key
    }

    /// Canonical artifact path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the artifact (what engines search).
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    async fn is_ready(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}

/// Existence state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentState {
    /// Nothing on disk and no build running.
    Absent,
    /// A build is in flight.
    Building,
    /// The artifact is at its canonical path.
    Ready,
}

/// Content-addressed store of precompiled environments.
pub struct ArtifactStore {
    environments_dir: PathBuf,
    scratch_dir: PathBuf,
    in_flight: InFlight,
}

impl ArtifactStore {
    /// Create a store over an existing cache layout.
    pub fn new(dirs: &CacheDirs) -> Self {
        Self {
            environments_dir: dirs.environments_dir.clone(),
            scratch_dir: dirs.scratch_dir.clone(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Canonical directory of ready environments.
    pub fn environments_dir(&self) -> &Path {
        &self.environments_dir
    }

    /// Return the environment for `prefix`, building it on first use.
    ///
    /// Failures are not cached: a later call retries the build.
    pub async fn ensure(
        &self,
        prefix: &str,
        builder: Arc<dyn EnvironmentBuilder>,
        budget: Duration,
    ) -> std::result::Result<EnvironmentHandle, BuildFailure> {
        let handle = self.handle_for(EnvironmentKey::of(prefix), builder.artifact_extension());
        if handle.is_ready().await {
            tracing::debug!(key = %handle.key, "using cached environment");
            return Ok(handle);
        }

        let build = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.get(&handle.path) {
                Some(build) => build.clone(),
                None => {
                    let build = self.spawn_build(prefix, handle.clone(), builder, budget);
                    in_flight.insert(handle.path.clone(), build.clone());
                    build
                }
            }
        };

        build.await
    }

    /// Start a build on the runtime so it completes even if every waiter goes away.
    ///
    /// Must be called with the in-flight map locked: the task removes its own
    /// entry when it finishes, which can only happen after the caller inserts it.
    fn spawn_build(
        &self,
        prefix: &str,
        handle: EnvironmentHandle,
        builder: Arc<dyn EnvironmentBuilder>,
        budget: Duration,
    ) -> SharedBuild {
        let entry = InFlightEntry {
            in_flight: Arc::clone(&self.in_flight),
            path: handle.path.clone(),
        };
        let job = BuildJob {
            prefix: prefix.to_string(),
            handle,
            scratch_dir: self.scratch_dir.clone(),
            environments_dir: self.environments_dir.clone(),
            builder,
            budget,
        };

        let task = tokio::spawn(async move {
            let _entry = entry;
            job.run().await
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(BuildFailure::Io(format!("environment build task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }

    /// Current state of the entry for `key`.
    pub fn state(&self, key: &EnvironmentKey, extension: &str) -> EnvironmentState {
        let handle = self.handle_for(key.clone(), extension);
        if handle.path.exists() {
            return EnvironmentState::Ready;
        }
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.contains_key(&handle.path) {
            EnvironmentState::Building
        } else {
            EnvironmentState::Absent
        }
    }

    /// Number of environment artifacts currently on disk.
    pub async fn cached_count(&self) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.environments_dir)
            .await
            .map_err(Error::at(&self.environments_dir))?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn handle_for(&self, key: EnvironmentKey, extension: &str) -> EnvironmentHandle {
        let path = self.environments_dir.join(format!("{key}.{extension}"));
        EnvironmentHandle { key, path }
    }
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("environments_dir", &self.environments_dir)
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

/// Removes a build's in-flight entry when the build task ends, panics included.
struct InFlightEntry {
    in_flight: InFlight,
    path: PathBuf,
}

impl Drop for InFlightEntry {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

/// Owned state of one build, so it can run as a spawned task.
struct BuildJob {
    prefix: String,
    handle: EnvironmentHandle,
    scratch_dir: PathBuf,
    environments_dir: PathBuf,
    builder: Arc<dyn EnvironmentBuilder>,
    budget: Duration,
}

impl BuildJob {
    async fn run(self) -> std::result::Result<EnvironmentHandle, BuildFailure> {
        // Another build may have finished between the caller's check and now.
        if self.handle.is_ready().await {
            return Ok(self.handle);
        }

        tracing::info!(key = %self.handle.key, "building precompiled environment");

        let scratch = tempfile::Builder::new()
            .prefix("texforge-fmt-")
            .tempdir_in(&self.scratch_dir)
            .map_err(|e| BuildFailure::Io(format!("failed to create scratch dir: {e}")))?;

        let request = BuildRequest {
            prefix: &self.prefix,
            key: &self.handle.key,
            scratch: scratch.path(),
            environments_dir: &self.environments_dir,
            budget: self.budget,
        };

        let artifact = match self.builder.build(request).await {
            Ok(artifact) => artifact,
            Err(failure) => {
                tracing::warn!(key = %self.handle.key, error = %failure, "environment build failed");
                return Err(failure);
            }
        };

        tokio::fs::rename(&artifact, &self.handle.path)
            .await
            .map_err(|e| BuildFailure::Io(format!("failed to move {}: {e}", artifact.display())))?;

        tracing::info!(key = %self.handle.key, path = %self.handle.path.display(), "environment ready");
        Ok(self.handle)
    }
}
