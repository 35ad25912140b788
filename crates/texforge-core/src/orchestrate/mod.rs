//! Compilation orchestration.
//!
//! Drives one job through the engine state machine:
//!
//! ```text
//! validate ──► acquire workspace
//!                  │
//!                  ├─ engine needs environment?
//!                  │     ├─ no marker / build failed ──► fallback engine
//!                  │     └─ handle ready ──► fast engine ──► ok
//!                  │                              └─ failed ──► fallback engine (once)
//!                  └─ plain engine ──► ok | terminal failure
//!                  │
//!              release workspace
//! ```
//!
//! The fallback reuses the same workspace with a fresh time budget and is
//! never chained further, so a job performs at most two engine invocations.

mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use crate::engine::{EngineKind, EngineOutcome, EngineRegistry, Invocation};
use crate::error::{CompileFailure, InvalidInput};
use crate::paths::CacheDirs;
use crate::store::{ArtifactStore, EnvironmentHandle, split_preamble};
use crate::workspace::{DocumentId, WorkspaceManager};

pub use types::{Attempt, CompilationResult, CompileRequest, HealthReport, OrchestratorConfig};

/// A request that passed validation.
struct ValidJob<'a> {
    engine: EngineKind,
    source: &'a str,
    document_id: Option<DocumentId>,
}

/// Runs compile jobs against a registry of engines.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    engines: EngineRegistry,
    store: Arc<ArtifactStore>,
    workspaces: Arc<WorkspaceManager>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator over a cache layout.
    pub fn new(dirs: &CacheDirs, engines: EngineRegistry, config: OrchestratorConfig) -> Self {
        Self::from_parts(
            engines,
            Arc::new(ArtifactStore::new(dirs)),
            Arc::new(WorkspaceManager::new(dirs)),
            config,
        )
    }

    /// Create an orchestrator from existing components.
    pub fn from_parts(
        engines: EngineRegistry,
        store: Arc<ArtifactStore>,
        workspaces: Arc<WorkspaceManager>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            engines,
            store,
            workspaces,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The environment cache.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// The workspace manager.
    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Compile one document. Never panics on engine failure; every outcome
    /// is a structured result with diagnostics and elapsed time.
    pub async fn compile(&self, request: CompileRequest) -> CompilationResult {
        let job_id = Uuid::new_v4();
        let span = tracing::info_span!("compile", %job_id, engine = request.engine_name());
        self.compile_inner(&request).instrument(span).await
    }

    async fn compile_inner(&self, request: &CompileRequest) -> CompilationResult {
        let started = Instant::now();
        let requested = request.engine_name();

        let job = match self.validate(request) {
            Ok(job) => job,
            Err(reason) => {
                tracing::info!(error = %reason, "rejected compile request");
                return CompilationResult::rejected(requested, reason, started.elapsed());
            }
        };

        let workspace = match self.workspaces.acquire(job.document_id.as_ref()).await {
            Ok(workspace) => workspace,
            Err(e) => {
                tracing::error!(error = %e, "failed to acquire workspace");
                return CompilationResult {
                    requested_engine: requested.to_string(),
                    engine: None,
                    outcome: Err(CompileFailure::Workspace(e.to_string())),
                    diagnostics: String::new(),
                    elapsed: started.elapsed(),
                    attempts: Vec::new(),
                };
            }
        };

        let mut attempts = Vec::with_capacity(2);
        let (engine, outcome) = self.drive(&job, workspace.path(), &mut attempts).await;

        if let Err(e) = workspace.release() {
            tracing::warn!(error = %e, "failed to release workspace");
        }

        let (outcome, diagnostics) = match outcome {
            EngineOutcome::Success {
                artifact,
                diagnostics,
            } => (Ok(artifact), diagnostics),
            EngineOutcome::Failure {
                failure,
                diagnostics,
            } => (Err(failure), diagnostics),
        };

        let result = CompilationResult {
            requested_engine: requested.to_string(),
            engine: Some(engine),
            outcome,
            diagnostics,
            elapsed: started.elapsed(),
            attempts,
        };

        match &result.outcome {
            Ok(artifact) => tracing::info!(
                %engine,
                bytes = artifact.len(),
                elapsed_ms = result.elapsed_ms(),
                "compilation succeeded"
            ),
            Err(failure) => tracing::info!(
                %engine,
                kind = failure.kind(),
                elapsed_ms = result.elapsed_ms(),
                "compilation failed"
            ),
        }

        result
    }

    fn validate<'a>(&self, request: &'a CompileRequest) -> Result<ValidJob<'a>, InvalidInput> {
        let engine = request.engine_name().parse::<EngineKind>()?;

        let size = request.source.len();
        if size > self.config.max_source_bytes {
            return Err(InvalidInput::SourceTooLarge {
                limit: self.config.max_source_bytes,
                actual: size,
            });
        }

        let document_id = request
            .document_id
            .as_deref()
            .map(|id| DocumentId::new(id).map_err(|_| InvalidInput::DocumentId(id.to_string())))
            .transpose()?;

        Ok(ValidJob {
            engine,
            source: &request.source,
            document_id,
        })
    }

    /// Run the requested engine and, on failure, its fallback once.
    async fn drive(
        &self,
        job: &ValidJob<'_>,
        workspace: &Path,
        attempts: &mut Vec<Attempt>,
    ) -> (EngineKind, EngineOutcome) {
        let descriptor = job.engine.descriptor();

        let environment = if descriptor.requires_environment {
            let environment = self.resolve_environment(job.engine, job.source).await;
            if environment.is_none() {
                if let Some(fallback) = descriptor.fallback {
                    tracing::info!(%fallback, "no precompiled environment, using fallback engine");
                    let outcome = self.invoke(fallback, job.source, workspace, None, attempts).await;
                    return (fallback, outcome);
                }
            }
            environment
        } else {
            None
        };

        let outcome = self
            .invoke(job.engine, job.source, workspace, environment.as_ref(), attempts)
            .await;
        if outcome.is_success() {
            return (job.engine, outcome);
        }

        match descriptor.fallback {
            Some(fallback) => {
                tracing::info!(engine = %job.engine, %fallback, "engine failed, falling back");
                let outcome = self.invoke(fallback, job.source, workspace, None, attempts).await;
                (fallback, outcome)
            }
            None => (job.engine, outcome),
        }
    }

    /// Split off the preamble and make sure its environment is built.
    ///
    /// `None` means the fast path does not apply to this document.
    async fn resolve_environment(
        &self,
        engine: EngineKind,
        source: &str,
    ) -> Option<EnvironmentHandle> {
        let Some((prefix, _body)) = split_preamble(source) else {
            tracing::info!("document has no body marker, skipping environment");
            return None;
        };

        let Some(builder) = self.engines.environment_builder(engine) else {
            tracing::warn!(%engine, "no environment builder registered");
            return None;
        };

        match self
            .store
            .ensure(prefix, builder.clone(), self.config.compile_timeout)
            .await
        {
            Ok(handle) => Some(handle),
            Err(failure) => {
                tracing::info!(error = %failure, "environment unavailable");
                None
            }
        }
    }

    async fn invoke(
        &self,
        engine: EngineKind,
        source: &str,
        workspace: &Path,
        environment: Option<&EnvironmentHandle>,
        attempts: &mut Vec<Attempt>,
    ) -> EngineOutcome {
        let Some(adapter) = self.engines.adapter(engine) else {
            tracing::warn!(%engine, "engine not registered");
            return EngineOutcome::failed(CompileFailure::EngineUnavailable { engine });
        };

        let started = Instant::now();
        let outcome = adapter
            .run(Invocation {
                source,
                workspace,
                environment,
                budget: self.config.compile_timeout,
                diagnostics_limit: self.config.diagnostics_limit,
            })
            .await;

        attempts.push(Attempt {
            engine,
            succeeded: outcome.is_success(),
            elapsed: started.elapsed(),
        });
        outcome
    }

    /// Probe every registered engine live and count cached environments.
    pub async fn health(&self) -> HealthReport {
        let probes = self.engines.adapters().map(|adapter| async move {
            (adapter.kind(), adapter.probe(self.config.probe_timeout).await)
        });
        let engines = futures::future::join_all(probes).await.into_iter().collect();

        let cached_environments = self.store.cached_count().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to count cached environments");
            0
        });

        HealthReport {
            engines,
            cached_environments,
        }
    }
}
