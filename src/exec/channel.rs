// src/exec/channel.rs

//! One compile-then-execute run of the persisted generated source.
//!
//! State machine: `CompilingToolchain -> RunningProgram -> Exited`, with
//! `Failed` absorbing from `CompilingToolchain`. The runtime process is
//! spawned only after the toolchain reports exit status zero; a stale or
//! partial binary is never run. Each instance is owned by exactly one
//! observer and torn down deterministically when the run ends, so input
//! forwarding can never leak across runs.

use std::ffi::OsStr;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::proc::{OutputStream, ProcessChannel, ProcessEvent};
use crate::types::{ObserverId, GENERATED_SOURCE, PROGRAM_BINARY};

/// Events relayed to the observer that started the run.
#[derive(Debug)]
pub enum ExecutionEvent {
    Data {
        bytes: Vec<u8>,
        stream: OutputStream,
    },
    Exited {
        code: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    CompilingToolchain,
    RunningProgram,
    Exited,
    Failed,
}

pub(crate) struct ExecutionChannel {
    observer: ObserverId,
    workspace: PathBuf,
    toolchain: PathBuf,
    state: ChannelState,
}

impl ExecutionChannel {
    pub(crate) fn new(
        observer: ObserverId,
        workspace: PathBuf,
        toolchain: PathBuf,
    ) -> Self {
        Self {
            observer,
            workspace,
            toolchain,
            state: ChannelState::CompilingToolchain,
        }
    }

    fn transition(&mut self, next: ChannelState) {
        debug!(observer = %self.observer, from = ?self.state, to = ?next, "execution channel transition");
        self.state = next;
    }

    /// Drive the run to completion.
    ///
    /// Returns when the runtime process exits, the toolchain fails, or a
    /// kill arrives (observer disconnect / service shutdown).
    pub(crate) async fn run(
        mut self,
        events: mpsc::Sender<ExecutionEvent>,
        mut input_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        mut kill_rx: mpsc::Receiver<()>,
    ) {
        let source = self.workspace.join(GENERATED_SOURCE);
        // Per-observer binary name; single-flight per observer makes it
        // race-free across concurrent observers.
        let binary = self
            .workspace
            .join(format!("{PROGRAM_BINARY}-{}", self.observer));

        // Stage 1: secondary toolchain. Diagnostics stream live.
        let (tool_tx, mut tool_rx) = mpsc::channel::<ProcessEvent>(64);
        let args = [source.as_os_str(), OsStr::new("-o"), binary.as_os_str()];
        let handle = match ProcessChannel::spawn(&self.toolchain, &args, &self.workspace, tool_tx)
        {
            Ok(handle) => handle,
            Err(e) => {
                warn!(observer = %self.observer, error = %e, "failed to spawn toolchain");
                self.transition(ChannelState::Failed);
                let _ = events
                    .send(ExecutionEvent::Data {
                        bytes: format!("{e}\n").into_bytes(),
                        stream: OutputStream::Diagnostic,
                    })
                    .await;
                let _ = events.send(ExecutionEvent::Exited { code: -1 }).await;
                return;
            }
        };

        let mut kill_open = true;
        let tool_code = loop {
            tokio::select! {
                kill = kill_rx.recv(), if kill_open => match kill {
                    Some(()) => {
                        debug!(observer = %self.observer, "run killed during toolchain stage");
                        handle.kill();
                        remove_binary(&binary).await;
                        return;
                    }
                    None => kill_open = false,
                },
                event = tool_rx.recv() => match event {
                    Some(ProcessEvent::Output { bytes, stream }) => {
                        let _ = events.send(ExecutionEvent::Data { bytes, stream }).await;
                    }
                    Some(ProcessEvent::Exited { code }) => break code,
                    None => break -1,
                }
            }
        };

        if tool_code != 0 {
            info!(observer = %self.observer, exit_code = tool_code, "toolchain failed; runtime not started");
            self.transition(ChannelState::Failed);
            let _ = events.send(ExecutionEvent::Exited { code: tool_code }).await;
            return;
        }

        // Stage 2: the produced binary, with live bidirectional I/O.
        self.transition(ChannelState::RunningProgram);
        let (run_tx, mut run_rx) = mpsc::channel::<ProcessEvent>(64);
        let handle = match ProcessChannel::spawn(&binary, &[], &self.workspace, run_tx) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(observer = %self.observer, error = %e, "failed to spawn program binary");
                self.transition(ChannelState::Failed);
                let _ = events
                    .send(ExecutionEvent::Data {
                        bytes: format!("{e}\n").into_bytes(),
                        stream: OutputStream::Diagnostic,
                    })
                    .await;
                let _ = events.send(ExecutionEvent::Exited { code: -1 }).await;
                remove_binary(&binary).await;
                return;
            }
        };

        let mut input_open = true;
        loop {
            tokio::select! {
                kill = kill_rx.recv(), if kill_open => match kill {
                    Some(()) => {
                        debug!(observer = %self.observer, "run killed during program stage");
                        handle.kill();
                        break;
                    }
                    None => kill_open = false,
                },
                bytes = input_rx.recv(), if input_open => match bytes {
                    Some(bytes) => handle.write(bytes),
                    None => input_open = false,
                },
                event = run_rx.recv() => match event {
                    Some(ProcessEvent::Output { bytes, stream }) => {
                        let _ = events.send(ExecutionEvent::Data { bytes, stream }).await;
                    }
                    Some(ProcessEvent::Exited { code }) => {
                        info!(observer = %self.observer, exit_code = code, "program exited");
                        self.transition(ChannelState::Exited);
                        let _ = events.send(ExecutionEvent::Exited { code }).await;
                        break;
                    }
                    None => break,
                }
            }
        }

        remove_binary(&binary).await;
    }
}

async fn remove_binary(binary: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(binary).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %binary.display(), error = %e, "failed to remove run binary");
        }
    }
}
