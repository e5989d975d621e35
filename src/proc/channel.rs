// src/proc/channel.rs

//! Generic piped child process with streamed output and queued input.
//!
//! `ProcessChannel::spawn` starts a child and wires three background tasks:
//! a writer draining the input queue into stdin in submission order, and one
//! reader per output pipe forwarding chunks tagged by stream. A supervisor
//! task waits for exit (or an explicit kill), then joins both readers before
//! emitting `Exited` — so the exit event is always delivered after every
//! output chunk the process produced.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::{CodebenchError, Result};

const READ_BUF_BYTES: usize = 4096;

/// Which pipe an output chunk arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Normal,
    Diagnostic,
}

/// Events a spawned process pushes to its consumer.
#[derive(Debug)]
pub enum ProcessEvent {
    Output {
        bytes: Vec<u8>,
        stream: OutputStream,
    },
    /// Sent exactly once, after all output has been flushed. A process
    /// killed by signal reports code -1.
    Exited { code: i32 },
}

/// Handle to a running process: input sink plus kill switch.
///
/// Cloneable; all clones feed the same serialized input queue. Writing after
/// the process has exited is a no-op, not an error.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    input_tx: mpsc::UnboundedSender<Vec<u8>>,
    kill_tx: mpsc::Sender<()>,
}

impl ProcessHandle {
    /// Queue bytes for the process's stdin. Submission order is write order.
    pub fn write(&self, bytes: Vec<u8>) {
        let _ = self.input_tx.send(bytes);
    }

    /// Request the process be killed. Idempotent; a no-op once exited.
    pub fn kill(&self) {
        let _ = self.kill_tx.try_send(());
    }
}

pub struct ProcessChannel;

impl ProcessChannel {
    /// Spawn `program` with `args` in `cwd`, streaming its output as
    /// [`ProcessEvent`]s into `event_tx`.
    pub fn spawn(
        program: impl AsRef<Path>,
        args: &[&OsStr],
        cwd: impl AsRef<Path>,
        event_tx: mpsc::Sender<ProcessEvent>,
    ) -> Result<ProcessHandle> {
        let program = program.as_ref();

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd.as_ref())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CodebenchError::Spawn {
                program: program.display().to_string(),
                source: e,
            })?;

        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (kill_tx, mut kill_rx) = mpsc::channel::<()>(1);

        // Writer: drains the queue into stdin. When the pipe breaks (process
        // exited) the task ends and further writes fall into the void.
        let mut stdin = child.stdin.take();
        tokio::spawn(async move {
            let Some(stdin) = stdin.as_mut() else {
                return;
            };
            while let Some(bytes) = input_rx.recv().await {
                if stdin.write_all(&bytes).await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_task = stdout.map(|pipe| {
            tokio::spawn(read_loop(pipe, OutputStream::Normal, event_tx.clone()))
        });
        let err_task = stderr.map(|pipe| {
            tokio::spawn(read_loop(pipe, OutputStream::Diagnostic, event_tx.clone()))
        });

        // Supervisor: wait for exit or kill, then join the readers so every
        // buffered chunk is delivered before the Exited event. A closed kill
        // channel (all handles dropped) is not a kill request.
        tokio::spawn(async move {
            let mut kill_open = true;
            let code = loop {
                tokio::select! {
                    status = child.wait() => break match status {
                        Ok(status) => status.code().unwrap_or(-1),
                        Err(e) => {
                            warn!(error = %e, "waiting for child process failed");
                            -1
                        }
                    },
                    kill = kill_rx.recv(), if kill_open => match kill {
                        Some(()) => {
                            debug!("kill requested for child process");
                            if let Err(e) = child.kill().await {
                                warn!(error = %e, "failed to kill child process");
                            }
                            break match child.wait().await {
                                Ok(status) => status.code().unwrap_or(-1),
                                Err(_) => -1,
                            };
                        }
                        None => kill_open = false,
                    },
                }
            };

            if let Some(task) = out_task {
                let _ = task.await;
            }
            if let Some(task) = err_task {
                let _ = task.await;
            }

            let _ = event_tx.send(ProcessEvent::Exited { code }).await;
        });

        Ok(ProcessHandle { input_tx, kill_tx })
    }
}

async fn read_loop(
    mut pipe: impl AsyncRead + Unpin,
    stream: OutputStream,
    event_tx: mpsc::Sender<ProcessEvent>,
) {
    let mut buf = [0u8; READ_BUF_BYTES];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let event = ProcessEvent::Output {
                    bytes: buf[..n].to_vec(),
                    stream,
                };
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
        }
    }
}
