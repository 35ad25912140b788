//! JSON bodies exchanged over HTTP.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use texforge_core::{CompilationResult, CompileRequest, HealthReport};

/// Body of `POST /compile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileBody {
    /// Full LaTeX source.
    pub source: String,
    /// Engine name; the server default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// Durable workspace identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl From<CompileBody> for CompileRequest {
    fn from(body: CompileBody) -> Self {
        Self {
            source: body.source,
            engine: body.engine,
            document_id: body.document_id,
        }
    }
}

/// Successful compile response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileSuccess {
    /// Artifact bytes, base64 encoded.
    pub artifact: String,
    /// Tail of the producing engine's log.
    pub diagnostics: String,
    /// Wall-clock time of the whole job.
    pub elapsed_ms: u64,
    /// Engine that produced the artifact.
    pub engine: String,
    /// Engine the caller asked for.
    pub requested_engine: String,
    /// Whether the fallback engine produced the artifact.
    pub fallback_used: bool,
}

/// Failed compile response, for every non-200 status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileError {
    /// Human-readable failure.
    pub error: String,
    /// Tail of the final engine's log; empty for rejected input and timeouts.
    pub diagnostics: String,
    /// Wall-clock time of the whole job.
    pub elapsed_ms: u64,
}

impl CompileSuccess {
    /// Build the response for a successful result.
    ///
    /// Returns `None` if the result carries no artifact.
    pub fn from_result(result: &CompilationResult) -> Option<Self> {
        let artifact = result.artifact()?;
        let engine = result.engine?;
        Some(Self {
            artifact: STANDARD.encode(artifact),
            diagnostics: result.diagnostics.clone(),
            elapsed_ms: result.elapsed_ms(),
            engine: engine.name().to_string(),
            requested_engine: result.requested_engine.clone(),
            fallback_used: result.fallback_used(),
        })
    }

    /// Decode the artifact.
    pub fn artifact_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.artifact)
    }
}

impl CompileError {
    /// Build the response for a failed result.
    pub fn from_result(result: &CompilationResult) -> Self {
        Self {
            error: result
                .failure()
                .map(ToString::to_string)
                .unwrap_or_else(|| "compilation failed".to_string()),
            diagnostics: result.diagnostics.clone(),
            elapsed_ms: result.elapsed_ms(),
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when the server answers.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Version line per engine, or `"not available"`.
    pub engines: BTreeMap<String, String>,
    /// Precompiled environments on disk.
    pub cached_environments: usize,
}

impl HealthResponse {
    /// Render a live health report.
    pub fn from_report(report: &HealthReport) -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            engines: report
                .engines
                .iter()
                .map(|(kind, probe)| (kind.name().to_string(), probe.describe().to_string()))
                .collect(),
            cached_environments: report.cached_environments,
        }
    }
}
