// src/lib.rs

pub mod artifacts;
pub mod cli;
pub mod compile;
pub mod config;
pub mod errors;
pub mod exec;
pub mod gateway;
pub mod logging;
pub mod proc;
pub mod term;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::artifacts::ArtifactStore;
use crate::cli::CliArgs;
use crate::compile::CompilationRunner;
use crate::config::load_and_validate;
use crate::exec::ExecutionManager;
use crate::gateway::AppState;
use crate::term::TerminalBroker;
use crate::types::WorkspaceEvent;

const WORKSPACE_EVENT_CAPACITY: usize = 256;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - artifact store (with startup scratch GC)
/// - compilation runner
/// - terminal session broker
/// - execution manager
/// - workspace watcher
/// - the HTTP/WebSocket gateway
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args)?;

    tokio::fs::create_dir_all(&cfg.workspace)
        .await
        .with_context(|| format!("creating workspace directory {:?}", cfg.workspace))?;
    tokio::fs::create_dir_all(&cfg.scratch_root)
        .await
        .with_context(|| format!("creating scratch root {:?}", cfg.scratch_root))?;

    // Scratch is transient; sweep anything a previous process left behind.
    let store = ArtifactStore::new(&cfg.scratch_root);
    store.gc_orphans();

    let runner = Arc::new(CompilationRunner::new(
        store,
        &cfg.compiler,
        &cfg.workspace,
        cfg.compile_timeout,
    ));

    let broker = Arc::new(TerminalBroker::new(&cfg.workspace, cfg.shell.clone()));
    broker.start()?;

    let exec = Arc::new(ExecutionManager::new(&cfg.workspace, &cfg.toolchain));

    let (workspace_events, _) = broadcast::channel::<WorkspaceEvent>(WORKSPACE_EVENT_CAPACITY);
    let _watcher_handle = watch::spawn_watcher(&cfg.workspace, workspace_events.clone())?;

    let state = AppState {
        runner,
        broker: Arc::clone(&broker),
        exec,
        workspace_events,
        workspace: cfg.workspace.clone(),
    };
    let app = gateway::router(state);

    let listener = TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("binding to {}", cfg.bind))?;
    info!(bind = %cfg.bind, workspace = %cfg.workspace.display(), "codebench listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("shutting down");
    broker.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        // Without a signal hook the server would be unstoppable; park the
        // future instead so shutdown still requires process termination.
        std::future::pending::<()>().await;
    }
    info!("Ctrl+C received");
}
