//! Compile command implementation for texforge CLI.

use std::path::{Path, PathBuf};

use anyhow::Context;
use texforge_core::{CompileRequest, Orchestrator};

use crate::colors;

/// Compile one file in-process and write the PDF next to it.
pub async fn execute(
    orchestrator: &Orchestrator,
    file: &Path,
    engine: Option<&str>,
    document_id: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let source = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut request = CompileRequest::new(source);
    if let Some(engine) = engine {
        request = request.engine(engine);
    }
    if let Some(id) = document_id {
        request = request.document_id(id);
    }

    let result = orchestrator.compile(request).await;

    let Some(artifact) = result.artifact() else {
        if !result.diagnostics.is_empty() {
            eprintln!("{}{}{}", colors::DIM, result.diagnostics.trim_end(), colors::RESET);
        }
        let reason = result
            .failure()
            .map(ToString::to_string)
            .unwrap_or_else(|| "compilation failed".to_string());
        anyhow::bail!("{reason}");
    };

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(file));
    tokio::fs::write(&output, artifact)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let engine = result.engine.map(|e| e.name()).unwrap_or("unknown");
    println!(
        "{}✓{} {} ({} bytes, {} ms, {})",
        colors::GREEN,
        colors::RESET,
        output.display(),
        artifact.len(),
        result.elapsed_ms(),
        engine
    );
    if result.fallback_used() {
        println!(
            "{}  fell back from {} to {}{}",
            colors::YELLOW,
            result.requested_engine,
            engine,
            colors::RESET
        );
    }

    Ok(())
}

fn default_output(file: &Path) -> PathBuf {
    file.with_extension("pdf")
}
