// src/exec/manager.rs

//! Per-observer bookkeeping for execution channel runs.
//!
//! At most one run may be active per observer. A second `start_run` while
//! one is active is rejected with `Busy` rather than queued: a queued run
//! would execute against whatever `generated.c` holds by the time it
//! dequeues, which may be a later compile's output.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{CodebenchError, Result};
use crate::exec::channel::ExecutionChannel;
use crate::exec::ExecutionEvent;
use crate::types::ObserverId;

struct ActiveRun {
    kill_tx: mpsc::Sender<()>,
}

/// Input sink for one active run. Bytes are forwarded to the runtime
/// process's stdin; sends after the run ends are silently dropped.
#[derive(Debug, Clone)]
pub struct ExecutionInput {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ExecutionInput {
    pub fn write(&self, bytes: Vec<u8>) {
        let _ = self.tx.send(bytes);
    }
}

/// Creates and tracks execution channel instances, one per observer at most.
pub struct ExecutionManager {
    workspace: PathBuf,
    toolchain: PathBuf,
    active: Arc<Mutex<HashMap<ObserverId, ActiveRun>>>,
}

impl ExecutionManager {
    pub fn new(workspace: impl Into<PathBuf>, toolchain: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            toolchain: toolchain.into(),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a run for `observer`, relaying its events into `events`.
    ///
    /// Returns the input sink for `executionWrite` forwarding, or `Busy` if
    /// the observer already has an active run. Runs for distinct observers
    /// are independent; there is no global serialization.
    pub fn start_run(
        &self,
        observer: ObserverId,
        events: mpsc::Sender<ExecutionEvent>,
    ) -> Result<ExecutionInput> {
        let mut active = self.active.lock().unwrap();
        if active.contains_key(&observer) {
            return Err(CodebenchError::Busy(observer));
        }

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = mpsc::channel(1);
        active.insert(observer, ActiveRun { kill_tx });
        drop(active);

        info!(observer = %observer, "starting execution channel");
        let channel = ExecutionChannel::new(
            observer,
            self.workspace.clone(),
            self.toolchain.clone(),
        );
        let slots = Arc::clone(&self.active);
        tokio::spawn(async move {
            channel.run(events, input_rx, kill_rx).await;
            slots.lock().unwrap().remove(&observer);
        });

        Ok(ExecutionInput { tx: input_tx })
    }

    /// Kill an observer's active run, if any. Called on disconnect and at
    /// service shutdown.
    pub fn abort(&self, observer: ObserverId) {
        if let Some(run) = self.active.lock().unwrap().remove(&observer) {
            debug!(observer = %observer, "aborting active run");
            let _ = run.kill_tx.try_send(());
        }
    }

    pub fn is_active(&self, observer: ObserverId) -> bool {
        self.active.lock().unwrap().contains_key(&observer)
    }
}

impl std::fmt::Debug for ExecutionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionManager")
            .field("toolchain", &self.toolchain)
            .finish_non_exhaustive()
    }
}
