//! Route tests driving the router in-process with fake engines.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};
use tempfile::TempDir;
use texforge_core::engine::BuildRequest;
use texforge_core::*;
use texforge_server::{AppState, CompileError, CompileSuccess, HealthResponse, create_router};
use tower::ServiceExt;

/// Succeeds unless the source contains `FAIL`.
struct ScriptedEngine {
    kind: EngineKind,
}

impl EngineAdapter for ScriptedEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn run<'a>(&'a self, invocation: Invocation<'a>) -> BoxFuture<'a, EngineOutcome> {
        async move {
            if invocation.source.contains("FAIL") {
                EngineOutcome::Failure {
                    failure: CompileFailure::NoArtifactProduced { engine: self.kind },
                    diagnostics: format!("{}: ! Undefined control sequence.", self.kind),
                }
            } else if invocation.source.contains("HANG") {
                EngineOutcome::failed(CompileFailure::EngineTimeout {
                    engine: self.kind,
                    budget: invocation.budget,
                })
            } else {
                EngineOutcome::Success {
                    artifact: format!("%PDF-{}", self.kind).into_bytes(),
                    diagnostics: "Output written on document.pdf".to_string(),
                }
            }
        }
        .boxed()
    }

    fn probe(&self, _budget: Duration) -> BoxFuture<'_, EngineProbe> {
        async move {
            match self.kind {
                EngineKind::Tectonic => EngineProbe::Available("tectonic 0.15.0".to_string()),
                _ => EngineProbe::Unavailable,
            }
        }
        .boxed()
    }
}

/// Format builder that refuses preambles containing `BROKEN`.
struct ScriptedBuilder;

impl EnvironmentBuilder for ScriptedBuilder {
    fn artifact_extension(&self) -> &'static str {
        "fmt"
    }

    fn build<'a>(&'a self, request: BuildRequest<'a>) -> BoxFuture<'a, std::result::Result<PathBuf, BuildFailure>> {
        async move {
            if request.prefix.contains("BROKEN") {
                return Err(BuildFailure::Io("format dump failed".to_string()));
            }
            let path = request.scratch.join(format!("{}.fmt", request.key));
            tokio::fs::write(&path, request.prefix)
                .await
                .map_err(|e| BuildFailure::Io(e.to_string()))?;
            Ok(path)
        }
        .boxed()
    }
}

fn app(config: OrchestratorConfig) -> (TempDir, Router) {
    let temp = TempDir::new().unwrap();
    let dirs = CacheDirs::from_root(temp.path()).unwrap();

    let mut registry = EngineRegistry::new();
    for kind in [EngineKind::Tectonic, EngineKind::PdflatexFast, EngineKind::Xelatex] {
        registry.register(Arc::new(ScriptedEngine { kind }));
    }
    registry.register_environment_builder(EngineKind::PdflatexFast, Arc::new(ScriptedBuilder));

    let orchestrator = Orchestrator::new(&dirs, registry, config);
    (temp, create_router(Arc::new(AppState { orchestrator })))
}

async fn post_compile(app: Router, body: Value) -> (StatusCode, Value) {
    post_compile_raw(app, body.to_string()).await
}

async fn post_compile_raw(app: Router, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/compile")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

const DOC: &str = "\\documentclass{article}\n\\begin{document}\nHi\n\\end{document}\n";

#[tokio::test]
async fn test_compile_default_engine() {
    let (_temp, app) = app(OrchestratorConfig::default());

    let (status, body) = post_compile(app, json!({ "source": DOC })).await;

    assert_eq!(status, StatusCode::OK);
    let success: CompileSuccess = serde_json::from_value(body).unwrap();
    assert_eq!(success.artifact_bytes().unwrap(), b"%PDF-tectonic");
    assert_eq!(success.engine, "tectonic");
    assert_eq!(success.requested_engine, "tectonic");
    assert!(!success.fallback_used);
    assert_eq!(success.diagnostics, "Output written on document.pdf");
}

#[tokio::test]
async fn test_compile_fast_path() {
    let (_temp, app) = app(OrchestratorConfig::default());

    let (status, body) = post_compile(
        app,
        json!({ "source": DOC, "engine": "pdflatex-fast", "document_id": "paper-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["engine"], "pdflatex-fast");
    assert_eq!(body["fallback_used"], false);
}

#[tokio::test]
async fn test_broken_preamble_reports_fallback() {
    let (_temp, app) = app(OrchestratorConfig::default());
    let source = "\\documentclass{article}\\BROKEN\n\\begin{document}x\\end{document}";

    let (status, body) = post_compile(app, json!({ "source": source, "engine": "pdflatex-fast" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["engine"], "tectonic");
    assert_eq!(body["requested_engine"], "pdflatex-fast");
    assert_eq!(body["fallback_used"], true);
}

#[tokio::test]
async fn test_compile_failure_is_422_with_diagnostics() {
    let (_temp, app) = app(OrchestratorConfig::default());

    let (status, body) = post_compile(app, json!({ "source": "FAIL", "engine": "xelatex" })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let error: CompileError = serde_json::from_value(body).unwrap();
    assert_eq!(error.error, "xelatex: no PDF generated");
    assert_eq!(error.diagnostics, "xelatex: ! Undefined control sequence.");
}

#[tokio::test]
async fn test_timeout_is_422_without_diagnostics() {
    let (_temp, app) = app(OrchestratorConfig::default());

    let (status, body) = post_compile(app, json!({ "source": "HANG" })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "compilation timed out after 30s");
    assert_eq!(body["diagnostics"], "");
}

#[tokio::test]
async fn test_unknown_engine_is_400() {
    let (_temp, app) = app(OrchestratorConfig::default());

    let (status, body) = post_compile(app, json!({ "source": DOC, "engine": "context" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("context"));
    assert!(error.contains("pdflatex-fast"));
}

#[tokio::test]
async fn test_bad_document_id_is_400() {
    let (_temp, app) = app(OrchestratorConfig::default());

    let (status, _body) = post_compile(app, json!({ "source": DOC, "document_id": "../../etc" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_source_is_413() {
    let config = OrchestratorConfig {
        max_source_bytes: 32,
        ..OrchestratorConfig::default()
    };
    let (_temp, app) = app(config);

    let (status, body) = post_compile(app, json!({ "source": "x".repeat(33) })).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "source exceeds 32 bytes (33 bytes)");
}

#[tokio::test]
async fn test_unregistered_engine_is_422() {
    let (_temp, app) = app(OrchestratorConfig::default());

    let (status, body) = post_compile(app, json!({ "source": DOC, "engine": "lualatex" })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "engine 'lualatex' not found on server");
}

#[tokio::test]
async fn test_missing_source_is_json_error() {
    let (_temp, app) = app(OrchestratorConfig::default());

    let (status, body) = post_compile(app, json!({ "engine": "tectonic" })).await;

    assert!(status.is_client_error());
    let error: CompileError = serde_json::from_value(body).unwrap();
    assert!(error.error.contains("source"));
    assert_eq!(error.diagnostics, "");
    assert_eq!(error.elapsed_ms, 0);
}

#[tokio::test]
async fn test_malformed_body_is_json_error() {
    let (_temp, app) = app(OrchestratorConfig::default());

    let (status, body) = post_compile_raw(app, "{\"source\": ".to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert_eq!(body["diagnostics"], "");
}

#[tokio::test]
async fn test_health_reports_probes() {
    let (_temp, app) = app(OrchestratorConfig::default());

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.engines["tectonic"], "tectonic 0.15.0");
    assert_eq!(health.engines["xelatex"], "not available");
    assert_eq!(health.engines.len(), 3);
    assert_eq!(health.cached_environments, 0);
}
