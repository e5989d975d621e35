// src/gateway/protocol.rs

//! Wire types for the observer-facing command surface.

use serde::{Deserialize, Serialize};

use crate::proc::OutputStream;
use crate::types::WorkspaceEventKind;

/// Body of `POST /compile`.
#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    pub code: String,
}

/// Body of `POST /files`. Best-effort workspace write.
#[derive(Debug, Deserialize)]
pub struct SaveFileRequest {
    pub path: String,
    pub content: String,
}

/// Commands an observer sends over the WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    TerminalWrite { data: String },
    ExecutionWrite { data: String },
    RunLowLevel,
}

/// Events the server pushes over the WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    TerminalData {
        data: String,
    },
    TerminalClosed,
    WorkspaceRefresh {
        kind: WorkspaceEventKind,
        path: String,
    },
    ExecutionData {
        data: String,
        channel: OutputStream,
    },
    ExecutionExited {
        code: i32,
    },
    Error {
        error: String,
        details: String,
    },
}
