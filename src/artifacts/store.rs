// src/artifacts/store.rs

//! Per-request scratch storage for compiler invocations.
//!
//! Every compile request gets its own directory under the scratch root,
//! named by the request id, so concurrent requests can never observe each
//! other's files. The layout is:
//!
//! ```text
//! <root>/<request-id>/input.code   source handed to the compiler
//! <root>/<request-id>/out/         artifact files the compiler writes
//! ```
//!
//! Scratch directories are transient. `dispose` removes them after every
//! invocation, and `gc_orphans` sweeps leftovers from a crashed previous
//! process at startup.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{CodebenchError, Result};
use crate::types::CompilationResult;

/// Input file name inside a scratch directory.
const INPUT_FILE: &str = "input.code";

/// Subdirectory the compiler writes artifacts into.
const OUTPUT_DIR: &str = "out";

const TOKENS_FILE: &str = "tokens.txt";
const ERRORS_FILE: &str = "errors.txt";
const IR_FILE: &str = "ir.txt";
const OPTIMIZED_IR_FILE: &str = "optimized_ir.txt";
const C_CODE_FILE: &str = "c_code.txt";
const OUTPUT_FILE: &str = "output.txt";

/// Paths of one request's scratch area.
#[derive(Debug, Clone)]
pub struct ScratchDirs {
    pub id: Uuid,
    pub dir: PathBuf,
    pub input: PathBuf,
    pub out: PathBuf,
}

/// Manages the scratch root and the read/cleanup of artifact files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Remove leftover per-request directories from a previous process.
    ///
    /// Scratch is transient by contract, so anything found under the root at
    /// startup is an orphan. Failures are logged and skipped; a directory we
    /// cannot delete must not prevent the service from starting.
    pub fn gc_orphans(&self) {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            debug!(path = %path.display(), "removing orphaned scratch directory");
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            if let Err(e) = result {
                warn!(path = %path.display(), error = %e, "failed to remove orphaned scratch");
            }
        }
    }

    /// Create a fresh scratch area for one request and write its input file.
    pub async fn prepare(&self, id: Uuid, source: &str) -> Result<ScratchDirs> {
        let dir = self.root.join(id.to_string());
        let out = dir.join(OUTPUT_DIR);
        let input = dir.join(INPUT_FILE);

        fs::create_dir_all(&out).await.map_err(|e| {
            CodebenchError::Storage(format!(
                "creating scratch directory {}: {e}",
                out.display()
            ))
        })?;

        fs::write(&input, source).await.map_err(|e| {
            CodebenchError::Storage(format!("writing input file {}: {e}", input.display()))
        })?;

        Ok(ScratchDirs {
            id,
            dir,
            input,
            out,
        })
    }

    /// Read the six well-known artifact files out of a scratch area.
    ///
    /// A missing or unreadable artifact becomes the empty value; collection
    /// itself never fails. Token and diagnostic files are split on newlines
    /// with empty lines dropped.
    pub async fn collect(&self, dirs: &ScratchDirs) -> CompilationResult {
        CompilationResult {
            tokens: split_lines(&read_or_empty(&dirs.out.join(TOKENS_FILE)).await),
            errors: split_lines(&read_or_empty(&dirs.out.join(ERRORS_FILE)).await),
            ir: read_or_empty(&dirs.out.join(IR_FILE)).await,
            optimized_ir: read_or_empty(&dirs.out.join(OPTIMIZED_IR_FILE)).await,
            c_code: read_or_empty(&dirs.out.join(C_CODE_FILE)).await,
            output: read_or_empty(&dirs.out.join(OUTPUT_FILE)).await,
        }
    }

    /// Remove a request's scratch area.
    ///
    /// Runs on every exit path of the compilation runner; failures are
    /// logged, never propagated, so a cleanup hiccup cannot mask the actual
    /// compile outcome.
    pub async fn dispose(&self, dirs: &ScratchDirs) {
        if let Err(e) = fs::remove_dir_all(&dirs.dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    request = %dirs.id,
                    path = %dirs.dir.display(),
                    error = %e,
                    "failed to remove scratch directory"
                );
            }
        }
    }
}

async fn read_or_empty(path: &Path) -> String {
    fs::read_to_string(path).await.unwrap_or_default()
}

fn split_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
