// src/gateway/mod.rs

//! Network-facing coordinator.
//!
//! HTTP carries the request/response commands (`/compile`, `/files`); the
//! WebSocket at `/ws` carries the streamed events and the observer-to-server
//! stream. Terminal and workspace events are broadcast to every observer;
//! compilation results and execution events go only to the requester.

pub mod protocol;
pub mod routes;
pub mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::compile::CompilationRunner;
use crate::exec::ExecutionManager;
use crate::term::TerminalBroker;
use crate::types::WorkspaceEvent;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<CompilationRunner>,
    pub broker: Arc<TerminalBroker>,
    pub exec: Arc<ExecutionManager>,
    pub workspace_events: broadcast::Sender<WorkspaceEvent>,
    pub workspace: PathBuf,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/compile", post(routes::compile))
        .route("/files", post(routes::save_file))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
