//! Gateway HTTP server: health probe and the chat-completions endpoint.

use crate::bridge::{Bridge, BridgeError};
use crate::config::Config;
use crate::medium::Medium;
use crate::protocol::{
    flatten_transcript, ChatCompletionRequest, ChatCompletionResponse, ErrorBody,
};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared state for the gateway (config + bridge).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub bridge: Arc<Bridge>,
}

/// Handler failure, mapped to an HTTP status with an OpenAI-style error body.
enum ApiError {
    InvalidRequest(String),
    Bridge(BridgeError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, typ, message) = match self {
            ApiError::InvalidRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", message)
            }
            ApiError::Bridge(BridgeError::Busy) => (
                StatusCode::CONFLICT,
                "conflict",
                "another completion is already waiting on the medium".to_string(),
            ),
            ApiError::Bridge(e @ BridgeError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "timeout", e.to_string())
            }
            ApiError::Bridge(e @ BridgeError::Medium(_)) => {
                (StatusCode::BAD_GATEWAY, "medium_error", e.to_string())
            }
        };
        (status, Json(ErrorBody::new(typ, message))).into_response()
    }
}

/// POST /v1/chat/completions — flatten the conversation, publish it to the
/// medium, wait for the operator to paste a reply back, and return it as a
/// single assistant choice.
async fn chat_completions(
    State(state): State<AppState>,
    Json(req): Json<ChatCompletionRequest>,
) -> Result<Json<ChatCompletionResponse>, ApiError> {
    if req.stream {
        return Err(ApiError::InvalidRequest(
            "streaming is not supported: the reply arrives whole once the operator pastes it back"
                .to_string(),
        ));
    }
    if req.max_tokens.is_some() || req.temperature.is_some() || req.top_p.is_some() {
        log::debug!("generation parameters accepted but unused (inference is manual)");
    }

    let transcript = flatten_transcript(&req.messages);
    log::info!(
        "transcript for model {:?} published to the medium; paste it into an AI chat, then copy the reply back",
        req.model
    );

    let content = state
        .bridge
        .exchange(&transcript)
        .await
        .map_err(ApiError::Bridge)?;
    Ok(Json(ChatCompletionResponse::assistant(req.model, content)))
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.server.port,
    }))
}

/// Run the gateway; binds to config.server.bind:config.server.port and starts
/// the medium watcher. Blocks until shutdown (e.g. Ctrl+C).
///
/// The medium is injected so tests (and alternative relays) can substitute an
/// in-memory slot for the system clipboard.
pub async fn run_server(config: Config, medium: Arc<dyn Medium>) -> Result<()> {
    let bridge = Arc::new(Bridge::new(
        medium,
        config.bridge.poll_interval(),
        config.bridge.wait_timeout(),
    ));
    let watcher = bridge.spawn_watcher();

    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let state = AppState {
        config: Arc::new(config),
        bridge,
    };
    let app = Router::new()
        .route("/", get(health_http))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    watcher.abort();
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}
