//! Core engine for texforge, a LaTeX compilation service.
//!
//! This crate provides:
//! - Engine adapters for external toolchains (tectonic, pdflatex, xelatex, lualatex)
//! - A content-addressed cache of precompiled preamble formats
//! - Ephemeral and durable per-document workspaces
//! - The orchestrator that picks an engine, uses the fast path when it can
//!   and falls back once when it fails

pub mod engine;
pub mod error;
pub mod orchestrate;
pub mod paths;
pub mod store;
pub mod workspace;

pub use engine::{
    ClassicEngine, EngineAdapter, EngineDescriptor, EngineKind, EngineOutcome, EngineProbe,
    EngineRegistry, EnvironmentBuilder, FormatEngine, Invocation, TectonicEngine,
};
pub use error::{BuildFailure, CompileFailure, Error, InvalidInput, Result};
pub use orchestrate::{
    Attempt, CompilationResult, CompileRequest, HealthReport, Orchestrator, OrchestratorConfig,
};
pub use paths::CacheDirs;
pub use store::{ArtifactStore, EnvironmentHandle, EnvironmentKey, EnvironmentState};
pub use workspace::{DocumentId, Workspace, WorkspaceManager};
