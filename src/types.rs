// src/types.rs

use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

/// Identifier for one connected client session.
///
/// Observers are assigned a fresh id when their WebSocket connects; the id is
/// what the terminal broker and execution manager key their bookkeeping on.
pub type ObserverId = Uuid;

/// File name under the workspace where the most recently generated low-level
/// source is persisted after a successful compile. The execution channel
/// compiles and runs this file; it is the only bridge between the two
/// pipelines.
pub const GENERATED_SOURCE: &str = "generated.c";

/// File name of the binary produced by the secondary toolchain.
pub const PROGRAM_BINARY: &str = "program";

/// The assembled output of one external compiler invocation.
///
/// Every field corresponds to one well-known artifact file. A field whose
/// artifact was never written is the empty value; absence is not an error.
/// The struct is assembled once by the compilation runner and never mutated
/// afterwards. Serialized field names match the JSON contract of the
/// `/compile` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompilationResult {
    pub tokens: Vec<String>,
    pub errors: Vec<String>,
    pub ir: String,
    pub optimized_ir: String,
    pub c_code: String,
    pub output: String,
}

/// Kind of filesystem mutation observed in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceEventKind {
    Created,
    Modified,
    Removed,
    Renamed,
}

/// A single workspace mutation, broadcast to every connected observer.
/// Transient; produced and consumed immediately, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceEvent {
    pub kind: WorkspaceEventKind,
    pub path: PathBuf,
}
