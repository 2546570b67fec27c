//! Server collaborator: an HTTP listener that runs programs per request.
//!
//! Server mode never loads a program up front; each request names its own
//! source. The listener holds the process open until the external shutdown
//! signal fires.

use crate::error::ExecutionError;
use crate::events::RunEvent;
use crate::loader::{self, LoaderOptions};
use crate::runner::Runner;
use crate::shutdown::{self, ShutdownSignal};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Health endpoint path.
pub const HEALTH_PATH: &str = "/healthz";
/// Run endpoint path.
pub const RUN_PATH: &str = "/run";

/// Shared request-handling state.
#[derive(Clone)]
pub struct AppState {
    runner: Arc<Runner>,
    loader: LoaderOptions,
    env: Vec<String>,
}

impl AppState {
    pub fn new(runner: Arc<Runner>) -> Self {
        let options = runner.options();
        let loader = LoaderOptions {
            cache: options.cache.clone(),
        };
        let env = options.env.clone();
        Self {
            runner,
            loader,
            env,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    /// Inline tool-script source text.
    #[serde(default)]
    source: Option<String>,
    /// Path or remote identifier, used when `source` is absent.
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    sub_tool: String,
    #[serde(default)]
    input: String,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    output: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the request router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health))
        .route(RUN_PATH, post(run))
        .with_state(state)
}

/// Bind the listen address and serve until the shutdown signal fires.
///
/// `graceful` controls close behavior: drain in-flight requests, or abort
/// the accept loop as soon as the signal arrives.
pub async fn serve(
    address: &str,
    state: AppState,
    signal: ShutdownSignal,
    graceful: bool,
) -> Result<(), ExecutionError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|e| ExecutionError::Server(format!("binding {address}: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| ExecutionError::Server(e.to_string()))?;
    run_listener(listener, state, signal, graceful).await?;
    tracing::info!(address = %local, "server stopped");
    Ok(())
}

/// Serve on an already-bound listener. Split from [`serve`] so tests can bind
/// port zero and learn the address first.
pub async fn run_listener(
    listener: TcpListener,
    state: AppState,
    signal: ShutdownSignal,
    graceful: bool,
) -> Result<(), ExecutionError> {
    if let Ok(local) = listener.local_addr() {
        tracing::info!(address = %local, "server listening");
        if let Some(sink) = &state.runner.options().event_sink {
            sink.emit(&RunEvent::ServerStarted {
                address: local.to_string(),
            });
        }
    }
    let event_sink = state.runner.options().event_sink.clone();
    let app = router(state);

    let result = if graceful {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(signal))
            .await
            .map_err(|e| ExecutionError::Server(e.to_string()))
    } else {
        tokio::select! {
            served = async { axum::serve(listener, app).await } => {
                served.map_err(|e| ExecutionError::Server(e.to_string()))
            }
            _ = shutdown::wait(signal) => Ok(()),
        }
    };

    if let Some(sink) = &event_sink {
        sink.emit(&RunEvent::ServerStopped);
    }
    result
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn run(State(state): State<AppState>, Json(request): Json<RunRequest>) -> impl IntoResponse {
    let program = match &request.source {
        Some(source) => loader::from_source("<request>", source, &request.sub_tool),
        None => match &request.path {
            Some(path) => loader::load(path, &request.sub_tool, &state.loader).await,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "request names neither source nor path".to_string(),
                    }),
                )
                    .into_response();
            }
        },
    };
    let program = match program {
        Ok(program) => program,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    match state.runner.run(&program, &state.env, &request.input).await {
        Ok(output) => (StatusCode::OK, Json(RunResponse { output })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
