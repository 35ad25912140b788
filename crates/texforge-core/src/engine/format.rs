//! Format-backed pdflatex: the fast path.
//!
//! A document preamble is dumped once into a `.fmt` file with
//! `pdflatex -ini`; later compiles load it with `-fmt=<hash>` instead of
//! re-reading every package.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::process::Command;

use crate::error::{BuildFailure, CompileFailure};

use super::diagnostics::{combine_streams, tail};
use super::process::{
    ProcessOutcome, collect_outcome, prepare_workspace, probe_program, run_process,
};
use super::{
    BuildRequest, EngineAdapter, EngineKind, EngineOutcome, EngineProbe, EnvironmentBuilder,
    Invocation, SOURCE_FILE,
};

/// Name of the preamble copy inside a scratch build directory.
const PREAMBLE_FILE: &str = "preamble.tex";

/// Directive that makes an `-ini` run write the format and stop.
const DUMP_DIRECTIVE: &str = "\\dump";

/// Base format every dumped preamble extends.
const BASE_FORMAT: &str = "&pdflatex";

/// Log excerpt kept when a format build fails.
const BUILD_LOG_TAIL: usize = 500;

/// pdflatex driven through precompiled format files.
#[derive(Debug, Clone)]
pub struct FormatEngine {
    program: OsString,
}

impl FormatEngine {
    /// Adapter resolving `pdflatex` from `PATH`.
    pub fn new() -> Self {
        Self::with_program(EngineKind::PdflatexFast.descriptor().program)
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
        command.current_dir(invocation.workspace);
        if let Some(environment) = invocation.environment {
            command
                .env("TEXFORMATS", format_search_path(environment.directory()))
                .arg(format!("-fmt={}", environment.key()));
        }
        command
            .args(["-interaction=nonstopmode", "-output-directory"])
            .arg(invocation.workspace)
            .arg(invocation.workspace.join(SOURCE_FILE));

        let outcome = run_process(command, invocation.budget).await;
        collect_outcome(
            EngineKind::PdflatexFast,
            invocation.workspace,
            outcome,
            invocation.budget,
            invocation.diagnostics_limit,
        )
        .await
    }

    async fn dump(&self, request: BuildRequest<'_>) -> Result<PathBuf, BuildFailure> {
        let engine = EngineKind::PdflatexFast;
        let preamble = format!("{}\n{DUMP_DIRECTIVE}\n", request.prefix.trim_end());
        tokio::fs::write(request.scratch.join(PREAMBLE_FILE), preamble)
            .await
            .map_err(|e| BuildFailure::Io(format!("failed to write {PREAMBLE_FILE}: {e}")))?;

        let mut command = Command::new(&self.program);
        command
            .current_dir(request.scratch)
            .env("TEXFORMATS", format_search_path(request.environments_dir))
            .args(["-ini", "-interaction=nonstopmode"])
            .arg(format!("-jobname={}", request.key))
            .arg(BASE_FORMAT)
            .arg(PREAMBLE_FILE);

        let artifact = request
            .scratch
            .join(format!("{}.{}", request.key, self.artifact_extension()));

        match run_process(command, request.budget).await {
            ProcessOutcome::Exited {
                status,
                stdout,
                stderr,
            } => {
                if status.success() && tokio::fs::try_exists(&artifact).await.unwrap_or(false) {
                    return Ok(artifact);
                }
                let log = combine_streams(&stdout, &stderr);
                tracing::warn!(
                    key = %request.key,
                    ?status,
                    log = tail(&log, BUILD_LOG_TAIL),
                    "failed to create format file"
                );
                Err(BuildFailure::Engine(CompileFailure::NoArtifactProduced {
                    engine,
                }))
            }
            ProcessOutcome::TimedOut => Err(BuildFailure::Engine(CompileFailure::EngineTimeout {
                engine,
                budget: request.budget,
            })),
            ProcessOutcome::Unavailable(_) => {
                Err(BuildFailure::Engine(CompileFailure::EngineUnavailable { engine }))
            }
            ProcessOutcome::WaitFailed(e) => Err(BuildFailure::Io(e.to_string())),
        }
    }
}

impl Default for FormatEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// `TEXFORMATS` value searching `dir` first, then the default path.
fn format_search_path(dir: &Path) -> OsString {
    // A trailing empty entry tells kpathsea to append its built-in path.
    std::env::join_paths([dir, Path::new("")])
        .unwrap_or_else(|_| dir.as_os_str().to_owned())
}

impl EngineAdapter for FormatEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::PdflatexFast
    }

    fn run<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, EngineOutcome> {
        self.compile(invocation).boxed()
    }

    fn probe(&self, budget: Duration) -> BoxFuture<'_, EngineProbe> {
        probe_program(&self.program, budget).boxed()
    }
}

impl EnvironmentBuilder for FormatEngine {
    fn artifact_extension(&self) -> &'static str {
        "fmt"
    }

    fn build<'a>(
        &'a self,
        request: BuildRequest<'a>,
    ) -> BoxFuture<'a, Result<PathBuf, BuildFailure>> {
        self.dump(request).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_format_search_path_appends_default() {
        let path = format_search_path(Path::new("/var/cache/texforge/environments"));
        assert_eq!(path, OsString::from("/var/cache/texforge/environments:"));
    }
}
