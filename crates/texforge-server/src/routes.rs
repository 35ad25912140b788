//! HTTP routes for the texforge server.

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use texforge_core::{CompilationResult, CompileFailure, InvalidInput, Orchestrator};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::protocol::{CompileBody, CompileError, CompileSuccess, HealthResponse};

/// Application state shared across handlers.
pub struct AppState {
    /// Orchestrator every compile request is run through.
    pub orchestrator: Orchestrator,
}

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/compile", post(compile_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler. Probes every engine live.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let report = state.orchestrator.health().await;
    Json(HealthResponse::from_report(&report))
}

/// Compile handler.
async fn compile_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CompileBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(&rejection),
    };
    let result = state.orchestrator.compile(body.into()).await;
    compile_response(&result)
}

/// Render an unreadable request body in the compile error shape.
fn rejection_response(rejection: &JsonRejection) -> Response {
    tracing::debug!(error = %rejection.body_text(), "rejected compile request body");
    let error = CompileError {
        error: rejection.body_text(),
        diagnostics: String::new(),
        elapsed_ms: 0,
    };
    (rejection.status(), Json(error)).into_response()
}

/// Render a compilation result as an HTTP response.
pub fn compile_response(result: &CompilationResult) -> Response {
    if let Some(success) = CompileSuccess::from_result(result) {
        return (StatusCode::OK, Json(success)).into_response();
    }

    let status = result
        .failure()
        .map_or(StatusCode::UNPROCESSABLE_ENTITY, status_for);
    (status, Json(CompileError::from_result(result))).into_response()
}

/// HTTP status for a surfaced failure.
pub fn status_for(failure: &CompileFailure) -> StatusCode {
    match failure {
        CompileFailure::InvalidInput(InvalidInput::SourceTooLarge { .. }) => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        CompileFailure::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CompileFailure::Workspace(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CompileFailure::EngineTimeout { .. }
        | CompileFailure::EngineUnavailable { .. }
        | CompileFailure::NoArtifactProduced { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}
