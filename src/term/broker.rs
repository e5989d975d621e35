// src/term/broker.rs

//! The shared interactive terminal session.
//!
//! Exactly one shell process exists for the lifetime of the service. It runs
//! on a pseudo-terminal; every output chunk is broadcast to all subscribed
//! observers in one global order, and input from any observer is queued into
//! a single serialized writer. Concurrent writers interleave at chunk
//! granularity, first-come-first-served — a documented limitation of the
//! single shared input stream.
//!
//! State machine: `Uninitialized -> Running -> Closed`. If the shell dies,
//! the broker broadcasts a termination notice and stays `Closed`; restart
//! requires an explicit `start()`.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::errors::{CodebenchError, Result};
use crate::types::ObserverId;

const PTY_ROWS: u16 = 24;
const PTY_COLS: u16 = 80;
const EVENT_CAPACITY: usize = 1024;

/// Events fanned out to terminal subscribers.
#[derive(Debug, Clone)]
pub enum TerminalEvent {
    Data(Vec<u8>),
    /// The shell exited. No auto-restart.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Uninitialized,
    Running,
    Closed,
}

struct Inner {
    state: BrokerState,
    subscribers: HashSet<ObserverId>,
    input_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    killer: Option<Box<dyn ChildKiller + Send + Sync>>,
    /// Incremented on every `start()`. A reader thread from a previous
    /// session compares epochs before touching state, so a stale exit can
    /// never close a restarted session.
    epoch: u64,
}

/// Owns the one shared PTY process and its subscriber fan-out.
///
/// The raw process handle is never exposed; callers interact only through
/// `write`, `subscribe` and `shutdown`.
pub struct TerminalBroker {
    workspace: PathBuf,
    shell: String,
    events: broadcast::Sender<TerminalEvent>,
    inner: Arc<Mutex<Inner>>,
}

impl TerminalBroker {
    pub fn new(workspace: impl Into<PathBuf>, shell: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            workspace: workspace.into(),
            shell: shell.into(),
            events,
            inner: Arc::new(Mutex::new(Inner {
                state: BrokerState::Uninitialized,
                subscribers: HashSet::new(),
                input_tx: None,
                killer: None,
                epoch: 0,
            })),
        }
    }

    pub fn state(&self) -> BrokerState {
        self.inner.lock().unwrap().state
    }

    /// Spawn the shell and transition to `Running`.
    ///
    /// Valid from `Uninitialized` and from `Closed` (explicit
    /// re-initialization). Errors if already running.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == BrokerState::Running {
            return Err(CodebenchError::TerminalUnavailable(BrokerState::Running));
        }

        let pty = native_pty_system();
        let pair = pty.openpty(PtySize {
            rows: PTY_ROWS,
            cols: PTY_COLS,
            pixel_width: 0,
            pixel_height: 0,
        })?;

        let mut cmd = CommandBuilder::new(&self.shell);
        cmd.cwd(&self.workspace);

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| CodebenchError::Spawn {
                program: self.shell.clone(),
                source: std::io::Error::other(e),
            })?;
        drop(pair.slave);

        let killer = child.clone_killer();
        let mut reader = pair.master.try_clone_reader()?;
        let mut writer = pair.master.take_writer()?;
        let master = pair.master;

        inner.epoch += 1;
        let epoch = inner.epoch;

        // Writer thread: single serialized consumer of the input queue.
        // Writes are applied whole, in arrival order.
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        thread::spawn(move || {
            while let Some(bytes) = input_rx.blocking_recv() {
                if writer.write_all(&bytes).is_err() {
                    break;
                }
                let _ = writer.flush();
            }
        });

        // Reader thread: owns the master side (keeping the PTY alive) and
        // the child handle for the final wait.
        let events = self.events.clone();
        let inner_ref = Arc::clone(&self.inner);
        thread::spawn(move || {
            let _master = master;
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let _ = events.send(TerminalEvent::Data(buf[..n].to_vec()));
                    }
                }
            }

            let status = child.wait();
            let mut inner = inner_ref.lock().unwrap();
            if inner.epoch != epoch {
                debug!("stale terminal reader exiting; session was restarted");
                return;
            }
            inner.state = BrokerState::Closed;
            inner.input_tx = None;
            inner.killer = None;
            match status {
                Ok(status) => info!(exit_code = status.exit_code(), "terminal shell exited"),
                Err(e) => warn!(error = %e, "waiting for terminal shell failed"),
            }
            let _ = events.send(TerminalEvent::Closed);
        });

        inner.input_tx = Some(input_tx);
        inner.killer = Some(killer);
        inner.state = BrokerState::Running;
        info!(shell = %self.shell, workspace = %self.workspace.display(), "terminal session started");
        Ok(())
    }

    /// Add an observer to the fan-out set.
    ///
    /// Late joiners start receiving from the next chunk; no replay of prior
    /// output. All receivers observe the same ordered sequence.
    pub fn subscribe(&self, observer: ObserverId) -> broadcast::Receiver<TerminalEvent> {
        let mut inner = self.inner.lock().unwrap();
        inner.subscribers.insert(observer);
        debug!(observer = %observer, subscribers = inner.subscribers.len(), "terminal subscribe");
        self.events.subscribe()
    }

    pub fn unsubscribe(&self, observer: ObserverId) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscribers.remove(&observer);
        debug!(observer = %observer, subscribers = inner.subscribers.len(), "terminal unsubscribe");
    }

    /// Queue bytes for the shell's input. Forwarded verbatim, in arrival
    /// order, through the single writer.
    pub fn write(&self, bytes: Vec<u8>) -> Result<()> {
        let inner = self.inner.lock().unwrap();
        match (&inner.input_tx, inner.state) {
            (Some(tx), BrokerState::Running) => {
                let _ = tx.send(bytes);
                Ok(())
            }
            (_, state) => Err(CodebenchError::TerminalUnavailable(state)),
        }
    }

    /// Kill the shell process. The reader thread observes the exit and
    /// performs the `Closed` transition and broadcast.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(killer) = inner.killer.as_mut() {
            if let Err(e) = killer.kill() {
                warn!(error = %e, "failed to kill terminal shell");
            }
        }
    }
}

impl std::fmt::Debug for TerminalBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalBroker")
            .field("shell", &self.shell)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
