// tests/watcher_events.rs

//! Workspace watcher: mutations under the root are broadcast with matching
//! kinds and paths.

use std::collections::HashSet;
use std::error::Error;
use std::time::Duration;

use codebench::types::{WorkspaceEvent, WorkspaceEventKind};
use codebench::watch::spawn_watcher;
use codebench_test_utils::init_tracing;
use tokio::sync::broadcast;

type TestResult = Result<(), Box<dyn Error>>;

const DEADLINE: Duration = Duration::from_secs(5);

/// Wait for an event whose path ends with `suffix` and whose kind is one of
/// `kinds`. Platforms differ on exact kinds for a fresh write (some report
/// Created then Modified), so tests accept a set.
async fn expect_event(
    rx: &mut broadcast::Receiver<WorkspaceEvent>,
    suffix: &str,
    kinds: &[WorkspaceEventKind],
) -> WorkspaceEvent {
    tokio::time::timeout(DEADLINE, async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event.path.ends_with(suffix) && kinds.contains(&event.kind) {
                        return event;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("watcher event channel closed")
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no {kinds:?} event for {suffix:?} within {DEADLINE:?}"))
}

#[tokio::test]
async fn file_mutations_are_broadcast() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let (tx, mut rx) = broadcast::channel::<WorkspaceEvent>(64);

    let _handle = spawn_watcher(tmp.path(), tx)?;
    // Give the native watcher a moment to arm before mutating.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let file = tmp.path().join("a.txt");
    std::fs::write(&file, "first")?;
    expect_event(
        &mut rx,
        "a.txt",
        &[WorkspaceEventKind::Created, WorkspaceEventKind::Modified],
    )
    .await;

    std::fs::write(&file, "second")?;
    expect_event(&mut rx, "a.txt", &[WorkspaceEventKind::Modified]).await;

    std::fs::remove_file(&file)?;
    expect_event(&mut rx, "a.txt", &[WorkspaceEventKind::Removed]).await;

    Ok(())
}

/// A rapid burst of writes to distinct paths delivers an event for every
/// path; coalescing may drop duplicates but never distinct paths.
#[tokio::test]
async fn burst_of_distinct_paths_is_not_dropped() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let (tx, mut rx) = broadcast::channel::<WorkspaceEvent>(256);

    let _handle = spawn_watcher(tmp.path(), tx)?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut remaining: HashSet<String> =
        (0..5).map(|i| format!("burst-{i}.txt")).collect();
    for name in &remaining {
        std::fs::write(tmp.path().join(name), "x")?;
    }

    tokio::time::timeout(DEADLINE, async {
        while !remaining.is_empty() {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(name) = event.path.file_name().and_then(|n| n.to_str()) {
                        remaining.remove(name);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("watcher event channel closed")
                }
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("missing events for {remaining:?}"));

    Ok(())
}
