// tests/terminal_broker.rs

//! Terminal session broker: shared ordering, fan-out, and lifecycle.
//!
//! These tests substitute a plain script for the interactive shell. The
//! `relay` script disables terminal echo and execs `cat`, so the bytes the
//! process emits are exactly the bytes the broker's input queue delivered —
//! which is what the ordering assertions rely on.

use std::error::Error;
use std::time::Duration;

use codebench::term::{BrokerState, TerminalBroker, TerminalEvent};
use codebench_test_utils::fake_tools::write_executable;
use codebench_test_utils::{init_tracing, with_timeout};
use tokio::sync::broadcast;
use uuid::Uuid;

type TestResult = Result<(), Box<dyn Error>>;

fn relay_shell(dir: &std::path::Path) -> std::path::PathBuf {
    write_executable(dir.join("relay.sh"), "stty -echo 2>/dev/null\nexec cat")
}

fn exiting_shell(dir: &std::path::Path) -> std::path::PathBuf {
    write_executable(dir.join("exiting.sh"), "exit 0")
}

/// Collect broadcast data until `needle` has been seen or the session ends.
async fn collect_until(
    rx: &mut broadcast::Receiver<TerminalEvent>,
    needle: &str,
) -> String {
    let mut seen = String::new();
    loop {
        match rx.recv().await {
            Ok(TerminalEvent::Data(bytes)) => {
                seen.push_str(&String::from_utf8_lossy(&bytes));
                if seen.contains(needle) {
                    return seen;
                }
            }
            Ok(TerminalEvent::Closed) => return seen,
            Err(_) => return seen,
        }
    }
}

/// Writes from two observers are concatenated in submission order, and both
/// observers see one identical output sequence.
#[tokio::test]
async fn observers_share_one_ordered_view() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let shell = relay_shell(tmp.path());

    let broker = TerminalBroker::new(tmp.path(), shell.display().to_string());
    let observer_a = Uuid::new_v4();
    let observer_b = Uuid::new_v4();
    let mut rx_a = broker.subscribe(observer_a);
    let mut rx_b = broker.subscribe(observer_b);

    broker.start()?;
    assert_eq!(broker.state(), BrokerState::Running);

    // Interleaved writes from both observers, ending with a newline so the
    // line-buffered PTY flushes.
    broker.write(b"abc".to_vec())?;
    broker.write(b"def".to_vec())?;
    broker.write(b"\n".to_vec())?;

    let view_a = with_timeout(collect_until(&mut rx_a, "abcdef")).await;
    let view_b = with_timeout(collect_until(&mut rx_b, "abcdef")).await;

    assert!(view_a.contains("abcdef"), "got: {view_a:?}");
    assert_eq!(view_a, view_b, "all observers see the same sequence");

    broker.shutdown();
    Ok(())
}

/// Example scenario: `echo hi` style write observed by both subscribers.
#[tokio::test]
async fn write_is_broadcast_to_all_subscribers() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let shell = relay_shell(tmp.path());

    let broker = TerminalBroker::new(tmp.path(), shell.display().to_string());
    let mut rx_a = broker.subscribe(Uuid::new_v4());
    let mut rx_b = broker.subscribe(Uuid::new_v4());
    broker.start()?;

    broker.write(b"echo hi\n".to_vec())?;

    let view_a = with_timeout(collect_until(&mut rx_a, "echo hi")).await;
    let view_b = with_timeout(collect_until(&mut rx_b, "echo hi")).await;
    assert!(view_a.contains("echo hi"));
    assert_eq!(view_a, view_b);

    broker.shutdown();
    Ok(())
}

/// State machine: writes are rejected outside `Running`, double-start is
/// rejected, and an exited shell moves the broker to `Closed` with a
/// broadcast notice.
#[tokio::test]
async fn lifecycle_transitions() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let shell = exiting_shell(tmp.path());

    let broker = TerminalBroker::new(tmp.path(), shell.display().to_string());
    assert_eq!(broker.state(), BrokerState::Uninitialized);
    assert!(broker.write(b"x".to_vec()).is_err(), "write before start");

    let mut rx = broker.subscribe(Uuid::new_v4());
    broker.start()?;

    // The shell exits immediately; expect the Closed notice.
    let closed = with_timeout(async {
        loop {
            match rx.recv().await {
                Ok(TerminalEvent::Closed) => break true,
                Ok(TerminalEvent::Data(_)) => continue,
                Err(_) => break false,
            }
        }
    })
    .await;
    assert!(closed, "termination notice must be broadcast");
    assert_eq!(broker.state(), BrokerState::Closed);
    assert!(broker.write(b"x".to_vec()).is_err(), "write after close");

    // No auto-restart; explicit re-initialization is allowed.
    broker.start()?;
    Ok(())
}

#[tokio::test]
async fn double_start_is_rejected() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let shell = relay_shell(tmp.path());

    let broker = TerminalBroker::new(tmp.path(), shell.display().to_string());
    broker.start()?;
    assert!(broker.start().is_err(), "already running");

    broker.shutdown();
    // Wait for the reader thread to observe the kill.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while broker.state() != BrokerState::Closed {
        assert!(std::time::Instant::now() < deadline, "broker never closed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}
