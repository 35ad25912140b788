//! Error types for texforge-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineKind;

/// Result type for texforge-core infrastructure operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure errors: cache layout, workspace provisioning, bad identifiers.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error tied to a specific path.
    #[error("IO error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document identifier is not a path-safe token.
    #[error("invalid document id: {0:?}")]
    InvalidDocumentId(String),
}

impl Error {
    /// Attach a path to an IO error.
    pub(crate) fn at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::PathIo { path, source }
    }
}

/// Ways a request can be rejected before any engine runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    /// Engine name outside the supported set.
    #[error("invalid engine {requested:?}. Allowed: {allowed}")]
    UnsupportedEngine { requested: String, allowed: String },

    /// Source exceeds the configured byte limit.
    #[error("source exceeds {limit} bytes ({actual} bytes)")]
    SourceTooLarge { limit: usize, actual: usize },

    /// Document identifier rejected.
    #[error("invalid document id {0:?}")]
    DocumentId(String),
}

/// A compilation failure that is surfaced to the caller.
///
/// Environment build failures never appear here: they are recovered by
/// falling back to another engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileFailure {
    /// Rejected before any engine was invoked.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    /// The engine exceeded its wall-clock budget and was killed.
    #[error("compilation timed out after {}s", budget.as_secs())]
    EngineTimeout { engine: EngineKind, budget: Duration },

    /// The engine executable could not be located or started.
    #[error("engine '{engine}' not found on server")]
    EngineUnavailable { engine: EngineKind },

    /// The engine exited but left no artifact behind.
    #[error("{engine}: no PDF generated")]
    NoArtifactProduced { engine: EngineKind },

    /// The workspace could not be prepared or read.
    #[error("workspace error: {0}")]
    Workspace(String),
}

impl CompileFailure {
    /// Short machine-readable classification.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::EngineTimeout { .. } => "engine_timeout",
            Self::EngineUnavailable { .. } => "engine_unavailable",
            Self::NoArtifactProduced { .. } => "no_artifact_produced",
            Self::Workspace(_) => "workspace",
        }
    }
}

/// Failure to produce a precompiled environment.
///
/// Cloneable because every waiter on a single-flight build receives it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildFailure {
    /// The initialisation run failed.
    #[error("environment build failed: {0}")]
    Engine(CompileFailure),

    /// Scratch directory or relocation failed.
    #[error("environment build IO error: {0}")]
    Io(String),
}
