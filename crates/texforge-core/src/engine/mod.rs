//! Engine adapters for external LaTeX toolchains.
//!
//! Every engine is an opaque subprocess with the same contract: given a
//! workspace containing `document.tex`, it either leaves `document.pdf`
//! behind or fails with diagnostics on its output streams.
//!
//! # Architecture
//!
//! ```text
//! EngineKind ──► EngineDescriptor (program, needs environment?, fallback)
//!     │
//!     └── EngineRegistry ──► Arc<dyn EngineAdapter>      (run, probe)
//!                       └──► Arc<dyn EnvironmentBuilder> (format dumps)
//! ```

mod classic;
mod diagnostics;
mod format;
mod kind;
mod process;
mod tectonic;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::{BuildFailure, CompileFailure};
use crate::store::{EnvironmentHandle, EnvironmentKey};

pub use classic::ClassicEngine;
pub use diagnostics::{combine_streams, tail};
pub use format::FormatEngine;
pub use kind::{EngineDescriptor, EngineKind};
pub use process::{ProcessOutcome, probe_program, run_process};
pub use tectonic::TectonicEngine;

/// Name of the source file written into every workspace.
pub const SOURCE_FILE: &str = "document.tex";

/// Name of the artifact every engine is expected to produce.
pub const ARTIFACT_FILE: &str = "document.pdf";

/// One engine invocation against a prepared workspace.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Full document source.
    pub source: &'a str,
    /// Working and output directory.
    pub workspace: &'a Path,
    /// Precompiled environment to inject, for engines that use one.
    pub environment: Option<&'a EnvironmentHandle>,
    /// Wall-clock budget for the subprocess.
    pub budget: Duration,
    /// Maximum diagnostics length in bytes (tail kept).
    pub diagnostics_limit: usize,
}

/// Structured result of one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    /// The engine produced an artifact.
    Success {
        artifact: Vec<u8>,
        diagnostics: String,
    },
    /// The engine failed; diagnostics are empty for timeouts and missing engines.
    Failure {
        failure: CompileFailure,
        diagnostics: String,
    },
}

impl EngineOutcome {
    /// Build a failure with no diagnostics.
    pub fn failed(failure: CompileFailure) -> Self {
        Self::Failure {
            failure,
            diagnostics: String::new(),
        }
    }

    /// Returns true if an artifact was produced.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Diagnostics text of either variant.
    pub fn diagnostics(&self) -> &str {
        match self {
            Self::Success { diagnostics, .. } | Self::Failure { diagnostics, .. } => diagnostics,
        }
    }
}

/// Availability of an engine executable, probed live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineProbe {
    /// Executable found; carries its version line.
    Available(String),
    /// Executable missing or not runnable.
    Unavailable,
}

impl EngineProbe {
    /// Version line, or `"not available"`.
    pub fn describe(&self) -> &str {
        match self {
            Self::Available(version) => version,
            Self::Unavailable => "not available",
        }
    }
}

/// Uniform interface to one external compilation engine.
pub trait EngineAdapter: Send + Sync {
    /// Which engine this adapter drives.
    fn kind(&self) -> EngineKind;

    /// Write the source into the workspace, run the engine and collect the artifact.
    fn run<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, EngineOutcome>;

    /// Check whether the engine is installed and report its version.
    fn probe(&self, budget: Duration) -> BoxFuture<'_, EngineProbe>;
}

/// Scratch build of one precompiled environment.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    /// Environment prefix, exactly as hashed.
    pub prefix: &'a str,
    /// Content key of the prefix.
    pub key: &'a EnvironmentKey,
    /// Private directory for this build; removed by the caller afterwards.
    pub scratch: &'a Path,
    /// Canonical environment directory (for engines that search it while dumping).
    pub environments_dir: &'a Path,
    /// Wall-clock budget for the subprocess.
    pub budget: Duration,
}

/// Engine capability for producing precompiled environments.
pub trait EnvironmentBuilder: Send + Sync {
    /// Extension of the produced artifact, without the dot.
    fn artifact_extension(&self) -> &'static str;

    /// Run the initialisation pass and return the artifact path inside `scratch`.
    fn build<'a>(&'a self, request: BuildRequest<'a>)
    -> BoxFuture<'a, Result<PathBuf, BuildFailure>>;
}

/// The set of adapters available to an orchestrator.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    adapters: BTreeMap<EngineKind, Arc<dyn EngineAdapter>>,
    builders: BTreeMap<EngineKind, Arc<dyn EnvironmentBuilder>>,
}

impl EngineRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every supported engine resolved from `PATH`.
    pub fn system() -> Self {
        let format = Arc::new(FormatEngine::new());
        let mut registry = Self::new();
        registry
            .register(Arc::new(TectonicEngine::new()))
            .register(Arc::new(ClassicEngine::new(EngineKind::Pdflatex)))
            .register(Arc::new(ClassicEngine::new(EngineKind::Xelatex)))
            .register(Arc::new(ClassicEngine::new(EngineKind::Lualatex)))
            .register(format.clone())
            .register_environment_builder(EngineKind::PdflatexFast, format);
        registry
    }

    /// Register an adapter, replacing any previous one for the same engine.
    pub fn register(&mut self, adapter: Arc<dyn EngineAdapter>) -> &mut Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    /// Register the environment builder used by `kind`.
    pub fn register_environment_builder(
        &mut self,
        kind: EngineKind,
        builder: Arc<dyn EnvironmentBuilder>,
    ) -> &mut Self {
        self.builders.insert(kind, builder);
        self
    }

    /// Adapter for an engine, if registered.
    pub fn adapter(&self, kind: EngineKind) -> Option<&Arc<dyn EngineAdapter>> {
        self.adapters.get(&kind)
    }

    /// Environment builder for an engine, if registered.
    pub fn environment_builder(&self, kind: EngineKind) -> Option<&Arc<dyn EnvironmentBuilder>> {
        self.builders.get(&kind)
    }

    /// All registered adapters in engine order.
    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn EngineAdapter>> {
        self.adapters.values()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("builders", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}
