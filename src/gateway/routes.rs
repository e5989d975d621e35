// src/gateway/routes.rs

//! HTTP command handlers.

use std::path::{Component, Path, PathBuf};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, warn};

use crate::gateway::protocol::{CompileRequest, SaveFileRequest};
use crate::gateway::AppState;

/// `POST /compile` — run one source text through the external compiler.
///
/// Success returns the assembled artifact JSON; a failure returns 500 with
/// `error`/`details` plus whatever diagnostics the compiler produced before
/// failing.
pub async fn compile(
    State(state): State<AppState>,
    Json(req): Json<CompileRequest>,
) -> Response {
    match state.runner.compile(&req.code).await {
        Ok(result) => Json(result).into_response(),
        Err(failure) => {
            warn!(reason = %failure.reason, "compile request failed");
            let body = json!({
                "error": "Compiler execution failed",
                "details": failure.reason.to_string(),
                "errors": failure.errors,
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// `POST /files` — best-effort write of a user file into the workspace.
pub async fn save_file(
    State(state): State<AppState>,
    Json(req): Json<SaveFileRequest>,
) -> Response {
    let Some(relative) = sanitize_relative(&req.path) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid path",
                "details": format!("'{}' must be relative and stay inside the workspace", req.path),
            })),
        )
            .into_response();
    };

    let target = state.workspace.join(relative);
    if let Err(e) = write_file(&target, &req.content).await {
        warn!(path = %target.display(), error = %e, "saveFile failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Failed to save file",
                "details": e.to_string(),
            })),
        )
            .into_response();
    }

    debug!(path = %target.display(), "saved workspace file");
    StatusCode::NO_CONTENT.into_response()
}

async fn write_file(target: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(target, content).await
}

/// Accept only plain relative paths: no roots, no `..`, no prefixes.
fn sanitize_relative(path: &str) -> Option<PathBuf> {
    let path = Path::new(path);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        return None;
    }
    Some(clean)
}
