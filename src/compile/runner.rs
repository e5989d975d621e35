// src/compile/runner.rs

//! Orchestrates one external compiler invocation.
//!
//! The runner takes `&self` so concurrent compile requests run in parallel;
//! isolation comes from the per-request scratch directories, not from
//! serializing invocations. The external compiler's runtime is bounded: an
//! invocation that neither exits nor produces artifacts within the
//! configured timeout is killed and reported as a toolchain failure.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::artifacts::{ArtifactStore, ScratchDirs};
use crate::types::{CompilationResult, GENERATED_SOURCE};

/// Why a compile request failed.
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("toolchain failure (exit code {0})")]
    NonZeroExit(i32),

    #[error("compiler did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("failed to start compiler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Storage(String),
}

/// A failed compile, carrying whatever diagnostics the compiler managed to
/// write before failing. Toolchain failure is not silent: partial
/// diagnostics are preserved for the caller to display.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct CompileFailure {
    pub reason: FailureReason,
    pub errors: Vec<String>,
}

impl CompileFailure {
    fn bare(reason: FailureReason) -> Self {
        Self {
            reason,
            errors: Vec::new(),
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.reason {
            FailureReason::NonZeroExit(code) => Some(code),
            _ => None,
        }
    }
}

/// Outcome of waiting on the external compiler process.
enum Invocation {
    Exited(i32),
    TimedOut,
    Io(std::io::Error),
}

/// Invokes the external compiler against a scratch area and assembles a
/// [`CompilationResult`] from the artifacts it wrote.
#[derive(Debug)]
pub struct CompilationRunner {
    store: ArtifactStore,
    compiler: PathBuf,
    workspace: PathBuf,
    compile_timeout: Duration,
}

impl CompilationRunner {
    pub fn new(
        store: ArtifactStore,
        compiler: impl Into<PathBuf>,
        workspace: impl Into<PathBuf>,
        compile_timeout: Duration,
    ) -> Self {
        Self {
            store,
            compiler: compiler.into(),
            workspace: workspace.into(),
            compile_timeout,
        }
    }

    /// Compile one source text.
    ///
    /// Steps: allocate scratch, invoke `<compiler> <input> <outdir>`, wait
    /// (bounded), collect artifacts, persist generated low-level source into
    /// the workspace on success, dispose scratch. Disposal happens exactly
    /// once on every path out of this function.
    pub async fn compile(
        &self,
        source: &str,
    ) -> std::result::Result<CompilationResult, CompileFailure> {
        let id = Uuid::new_v4();
        info!(request = %id, "compile request");

        let dirs = match self.store.prepare(id, source).await {
            Ok(dirs) => dirs,
            Err(e) => {
                return Err(CompileFailure::bare(FailureReason::Storage(e.to_string())));
            }
        };

        let invocation = self.invoke(&dirs).await;

        // Collect before disposal so partial diagnostics survive failures.
        let result = self.store.collect(&dirs).await;

        if let Invocation::Exited(0) = invocation {
            self.persist_generated(&result).await;
        }

        self.store.dispose(&dirs).await;

        match invocation {
            Invocation::Exited(0) => {
                info!(request = %id, "compile succeeded");
                Ok(result)
            }
            Invocation::Exited(code) => {
                info!(request = %id, exit_code = code, "compiler exited non-zero");
                Err(CompileFailure {
                    reason: FailureReason::NonZeroExit(code),
                    errors: result.errors,
                })
            }
            Invocation::TimedOut => {
                warn!(request = %id, timeout = ?self.compile_timeout, "compiler timed out; killed");
                Err(CompileFailure {
                    reason: FailureReason::TimedOut(self.compile_timeout),
                    errors: result.errors,
                })
            }
            Invocation::Io(e) => Err(CompileFailure::bare(FailureReason::Spawn {
                program: self.compiler.display().to_string(),
                source: e,
            })),
        }
    }

    async fn invoke(&self, dirs: &ScratchDirs) -> Invocation {
        // Diagnostics arrive through the artifact files, so the process's
        // own streams are discarded.
        let mut child = match Command::new(&self.compiler)
            .arg(&dirs.input)
            .arg(&dirs.out)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return Invocation::Io(e),
        };

        match timeout(self.compile_timeout, child.wait()).await {
            Ok(Ok(status)) => Invocation::Exited(status.code().unwrap_or(-1)),
            Ok(Err(e)) => Invocation::Io(e),
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill timed-out compiler process");
                }
                Invocation::TimedOut
            }
        }
    }

    /// Persist the generated low-level source into the workspace.
    ///
    /// This is the bridge between the compile pipeline and the execution
    /// channel, and it must run before scratch disposal. A persist failure
    /// does not fail the compile itself; the execution channel will surface
    /// the missing file when a run is attempted.
    async fn persist_generated(&self, result: &CompilationResult) {
        if result.c_code.is_empty() {
            return;
        }

        let target = self.workspace.join(GENERATED_SOURCE);
        if let Err(e) = tokio::fs::write(&target, &result.c_code).await {
            error!(
                path = %target.display(),
                error = %e,
                "failed to persist generated source"
            );
        }
    }
}
