// src/watch/watcher.rs

//! Workspace change notification.
//!
//! Observes the workspace directory tree and broadcasts a
//! [`WorkspaceEvent`] for every filesystem mutation. State is purely the
//! live filesystem; nothing is persisted. Watch failures are logged and
//! never crash the service.

use std::path::PathBuf;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::types::{WorkspaceEvent, WorkspaceEventKind};

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher that observes `root` recursively and
/// broadcasts a [`WorkspaceEvent`] per mutated path.
///
/// Paths repeated within one native event batch are coalesced; distinct
/// paths in a rapid burst are all delivered.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    events_tx: broadcast::Sender<WorkspaceEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        {
            let event_tx = event_tx.clone();
            move |res: notify::Result<Event>| {
                match res {
                    Ok(event) => {
                        if let Err(err) = event_tx.send(event) {
                            // We can't log via tracing here easily, so fallback to stderr.
                            eprintln!("codebench: failed to forward notify event: {err}");
                        }
                    }
                    Err(err) => {
                        eprintln!("codebench: file watch error: {err}");
                    }
                }
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("workspace watcher started on {:?}", root);

    // Async task that consumes notify events and broadcasts workspace events.
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");

            let Some(kind) = map_event_kind(&event.kind) else {
                continue;
            };

            let mut seen: Vec<&PathBuf> = Vec::new();
            for path in &event.paths {
                if seen.contains(&path) {
                    continue;
                }
                seen.push(path);

                let workspace_event = WorkspaceEvent {
                    kind,
                    path: path.clone(),
                };
                if let Err(e) = events_tx.send(workspace_event) {
                    // No observers connected; nothing to deliver.
                    debug!(error = %e, "workspace event dropped (no subscribers)");
                }
            }
        }
        warn!("workspace watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Map a notify event kind onto the workspace event taxonomy.
///
/// Access-only events carry no mutation and are skipped.
fn map_event_kind(kind: &EventKind) -> Option<WorkspaceEventKind> {
    use notify::event::ModifyKind;

    match kind {
        EventKind::Create(_) => Some(WorkspaceEventKind::Created),
        EventKind::Modify(ModifyKind::Name(_)) => Some(WorkspaceEventKind::Renamed),
        EventKind::Modify(_) => Some(WorkspaceEventKind::Modified),
        EventKind::Remove(_) => Some(WorkspaceEventKind::Removed),
        EventKind::Access(_) => None,
        EventKind::Any | EventKind::Other => Some(WorkspaceEventKind::Modified),
    }
}
