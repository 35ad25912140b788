//! Classic TeX engines: pdflatex, xelatex, lualatex.

use std::ffi::OsString;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::process::Command;

use super::process::{collect_outcome, prepare_workspace, probe_program, run_process};
use super::{EngineAdapter, EngineKind, EngineOutcome, EngineProbe, Invocation, SOURCE_FILE};

/// Runs a classic engine in non-stop mode with the workspace as output directory.
#[derive(Debug, Clone)]
pub struct ClassicEngine {
    kind: EngineKind,
    program: OsString,
}

impl ClassicEngine {
    /// Adapter resolving the engine's program from `PATH`.
    pub fn new(kind: EngineKind) -> Self {
        Self::with_program(kind, kind.descriptor().program)
    }

    /// Adapter using a specific executable.
    pub fn with_program(kind: EngineKind, program: impl Into<OsString>) -> Self {
        Self {
            kind,
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
            .args(["-interaction=nonstopmode", "-output-directory"])
            .arg(invocation.workspace)
            .arg(invocation.workspace.join(SOURCE_FILE));

        let outcome = run_process(command, invocation.budget).await;
        collect_outcome(
            self.kind,
            invocation.workspace,
            outcome,
            invocation.budget,
            invocation.diagnostics_limit,
        )
        .await
    }
}

impl EngineAdapter for ClassicEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn run<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, EngineOutcome> {
        self.compile(invocation).boxed()
    }

    fn probe(&self, budget: Duration) -> BoxFuture<'_, EngineProbe> {
        probe_program(&self.program, budget).boxed()
    }
}
