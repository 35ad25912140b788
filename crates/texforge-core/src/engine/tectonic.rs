//! Tectonic adapter.

use std::ffi::OsString;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::process::Command;

use super::process::{collect_outcome, prepare_workspace, probe_program, run_process};
use super::{EngineAdapter, EngineKind, EngineOutcome, EngineProbe, Invocation, SOURCE_FILE};

/// Runs `tectonic -X compile` in the workspace.
#[derive(Debug, Clone)]
pub struct TectonicEngine {
    program: OsString,
}

impl TectonicEngine {
    /// Adapter resolving `tectonic` from `PATH`.
    pub fn new() -> Self {
        Self::with_program(EngineKind::Tectonic.descriptor().program)
    }

    /// Adapter using a specific executable.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn compile(&self, invocation: Invocation<'_>) -> EngineOutcome {
        if let Err(failure) = prepare_workspace(invocation.workspace, invocation.source).await {
            return EngineOutcome::failed(failure);
        }

        let mut command = Command::new(&self.program);
        command
            .current_dir(invocation.workspace)
            .args(["-X", "compile", "--outdir"])
            .arg(invocation.workspace)
            .arg(invocation.workspace.join(SOURCE_FILE));

        let outcome = run_process(command, invocation.budget).await;
        collect_outcome(
            EngineKind::Tectonic,
            invocation.workspace,
            outcome,
            invocation.budget,
            invocation.diagnostics_limit,
        )
        .await
    }
}

impl Default for TectonicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineAdapter for TectonicEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Tectonic
    }

    fn run<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, EngineOutcome> {
        self.compile(invocation).boxed()
    }

    fn probe(&self, budget: Duration) -> BoxFuture<'_, EngineProbe> {
        probe_program(&self.program, budget).boxed()
    }
}
