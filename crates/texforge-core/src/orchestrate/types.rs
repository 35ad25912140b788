//! Request, result and report types for the orchestrator.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::engine::{EngineKind, EngineProbe};
use crate::error::{CompileFailure, InvalidInput};

/// Orchestrator limits.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wall-clock budget per engine invocation (also per environment build).
    pub compile_timeout: Duration,

    /// Largest accepted source, in bytes.
    pub max_source_bytes: usize,

    /// Diagnostics tail bound, in bytes.
    pub diagnostics_limit: usize,

    /// Budget for each `--version` probe.
    pub probe_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            compile_timeout: Duration::from_secs(30),
            max_source_bytes: 500 * 1024,
            diagnostics_limit: 5000,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// A compile job as received from a caller.
///
/// Fields are unvalidated; the orchestrator rejects bad values as
/// [`InvalidInput`] without invoking any engine.
#[derive(Debug, Clone, Default)]
pub struct CompileRequest {
    /// Full document source.
    pub source: String,
    /// Engine name; [`EngineKind::DEFAULT`] when absent.
    pub engine: Option<String>,
    /// Identifier of a durable workspace.
    pub document_id: Option<String>,
}

impl CompileRequest {
    /// Request for `source` on the default engine in an ephemeral workspace.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Select an engine by name.
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Compile in the durable workspace of `document_id`.
    pub fn document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Requested engine name, defaulted.
    pub fn engine_name(&self) -> &str {
        self.engine.as_deref().unwrap_or(EngineKind::DEFAULT.name())
    }
}

/// One engine invocation performed for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// Engine that ran.
    pub engine: EngineKind,
    /// Whether it produced an artifact.
    pub succeeded: bool,
    /// Wall-clock time of the invocation.
    pub elapsed: Duration,
}

/// Final result of a compile job.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    /// Engine name as requested.
    pub requested_engine: String,

    /// Engine whose outcome is final; `None` when rejected before any run.
    pub engine: Option<EngineKind>,

    /// Artifact bytes, or the surfaced failure.
    pub outcome: Result<Vec<u8>, CompileFailure>,

    /// Tail of the final engine's output.
    pub diagnostics: String,

    /// Time from validation to final outcome, including any fallback.
    pub elapsed: Duration,

    /// Engine invocations in order (at most two).
    pub attempts: Vec<Attempt>,
}

impl CompilationResult {
    pub(crate) fn rejected(requested_engine: &str, reason: InvalidInput, elapsed: Duration) -> Self {
        Self {
            requested_engine: requested_engine.to_string(),
            engine: None,
            outcome: Err(reason.into()),
            diagnostics: String::new(),
            elapsed,
            attempts: Vec::new(),
        }
    }

    /// Returns true if an artifact was produced.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Artifact bytes, if any.
    pub fn artifact(&self) -> Option<&[u8]> {
        self.outcome.as_deref().ok()
    }

    /// Surfaced failure, if any.
    pub fn failure(&self) -> Option<&CompileFailure> {
        self.outcome.as_ref().err()
    }

    /// Whether the final engine differs from the requested one.
    pub fn fallback_used(&self) -> bool {
        self.engine
            .is_some_and(|engine| engine.name() != self.requested_engine)
    }

    /// Elapsed time in whole milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Live introspection of engines and the environment cache.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Probe result per registered engine.
    pub engines: BTreeMap<EngineKind, EngineProbe>,
    /// Environment artifacts currently cached.
    pub cached_environments: usize,
}
