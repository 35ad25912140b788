//! Bounded subprocess execution shared by every engine adapter.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::error::CompileFailure;

use super::diagnostics::{combine_streams, tail};
use super::{ARTIFACT_FILE, EngineKind, EngineOutcome, EngineProbe, SOURCE_FILE};

/// How a bounded subprocess run ended.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The process exited on its own.
    Exited {
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// The budget elapsed; the process was killed.
    TimedOut,
    /// The executable could not be started.
    Unavailable(io::Error),
    /// The process started but collecting its output failed.
    WaitFailed(io::Error),
}

/// Run `command` to completion or until `budget` elapses.
///
/// The child is spawned with `kill_on_drop`, so dropping the wait future on
/// timeout terminates it.
pub async fn run_process(mut command: Command, budget: Duration) -> ProcessOutcome {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return ProcessOutcome::Unavailable(e),
    };

    match tokio::time::timeout(budget, child.wait_with_output()).await {
        Ok(Ok(output)) => ProcessOutcome::Exited {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        },
        Ok(Err(e)) => ProcessOutcome::WaitFailed(e),
        Err(_) => ProcessOutcome::TimedOut,
    }
}

/// Probe an executable with `--version` and return its first output line.
pub async fn probe_program(program: impl AsRef<OsStr>, budget: Duration) -> EngineProbe {
    let Ok(path) = which::which(program) else {
        return EngineProbe::Unavailable;
    };

    let mut command = Command::new(path);
    command.arg("--version");

    match run_process(command, budget).await {
        ProcessOutcome::Exited { stdout, .. } => {
            let stdout = String::from_utf8_lossy(&stdout);
            let version = stdout
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or("unknown");
            EngineProbe::Available(version.to_string())
        }
        _ => EngineProbe::Unavailable,
    }
}

/// Write the source into the workspace and clear any artifact left by an
/// earlier job, so a failed run can never return stale output.
pub(crate) async fn prepare_workspace(workspace: &Path, source: &str) -> Result<(), CompileFailure> {
    tokio::fs::write(workspace.join(SOURCE_FILE), source)
        .await
        .map_err(|e| CompileFailure::Workspace(format!("failed to write {SOURCE_FILE}: {e}")))?;

    match tokio::fs::remove_file(workspace.join(ARTIFACT_FILE)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CompileFailure::Workspace(format!(
            "failed to clear stale {ARTIFACT_FILE}: {e}"
        ))),
    }
}

/// Map a finished process to an engine outcome by looking for the artifact.
pub(crate) async fn collect_outcome(
    engine: EngineKind,
    workspace: &Path,
    outcome: ProcessOutcome,
    budget: Duration,
    diagnostics_limit: usize,
) -> EngineOutcome {
    let (stdout, stderr) = match outcome {
        ProcessOutcome::Exited {
            status,
            stdout,
            stderr,
        } => {
            tracing::debug!(%engine, ?status, "engine exited");
            (stdout, stderr)
        }
        ProcessOutcome::TimedOut => {
            tracing::warn!(%engine, budget_secs = budget.as_secs(), "engine timed out");
            return EngineOutcome::failed(CompileFailure::EngineTimeout { engine, budget });
        }
        ProcessOutcome::Unavailable(e) => {
            tracing::warn!(%engine, error = %e, "engine could not be started");
            return EngineOutcome::failed(CompileFailure::EngineUnavailable { engine });
        }
        ProcessOutcome::WaitFailed(e) => {
            return EngineOutcome::Failure {
                failure: CompileFailure::NoArtifactProduced { engine },
                diagnostics: tail(&e.to_string(), diagnostics_limit).to_string(),
            };
        }
    };

    let log = combine_streams(&stdout, &stderr);
    let diagnostics = tail(&log, diagnostics_limit).to_string();

    match tokio::fs::read(workspace.join(ARTIFACT_FILE)).await {
        Ok(artifact) => EngineOutcome::Success {
            artifact,
            diagnostics,
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => EngineOutcome::Failure {
            failure: CompileFailure::NoArtifactProduced { engine },
            diagnostics,
        },
        Err(e) => EngineOutcome::Failure {
            failure: CompileFailure::Workspace(format!("failed to read {ARTIFACT_FILE}: {e}")),
            diagnostics,
        },
    }
}
