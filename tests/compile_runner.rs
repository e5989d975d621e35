// tests/compile_runner.rs

//! Compilation runner behaviour against compiler doubles.

use std::error::Error;
use std::time::Duration;

use codebench::artifacts::ArtifactStore;
use codebench::compile::{CompilationRunner, FailureReason};
use codebench_test_utils::fake_tools::{fake_compiler, sleeping_compiler};
use codebench_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Fixture {
    _tmp: tempfile::TempDir,
    scratch: std::path::PathBuf,
    workspace: std::path::PathBuf,
    tools: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().expect("tempdir");
    let scratch = tmp.path().join("scratch");
    let workspace = tmp.path().join("workspace");
    let tools = tmp.path().join("tools");
    std::fs::create_dir_all(&scratch).unwrap();
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::create_dir_all(&tools).unwrap();
    Fixture {
        _tmp: tmp,
        scratch,
        workspace,
        tools,
    }
}

fn runner(fx: &Fixture, compiler: &std::path::Path, timeout: Duration) -> CompilationRunner {
    CompilationRunner::new(
        ArtifactStore::new(&fx.scratch),
        compiler,
        &fx.workspace,
        timeout,
    )
}

fn scratch_is_empty(fx: &Fixture) -> bool {
    std::fs::read_dir(&fx.scratch).unwrap().next().is_none()
}

/// A compiler writing an empty errors file and a program output yields the
/// matching result fields.
#[tokio::test]
async fn successful_compile_reflects_artifacts() -> TestResult {
    init_tracing();
    let fx = fixture();
    let compiler = fake_compiler(
        &fx.tools,
        &[("errors.txt", ""), ("output.txt", "10")],
        0,
    );
    let runner = runner(&fx, &compiler, TIMEOUT);

    let result = runner.compile("let a be 10\noutput a").await?;

    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(result.output, "10\n");
    assert!(result.tokens.is_empty());
    assert!(result.ir.is_empty());
    assert!(scratch_is_empty(&fx));
    Ok(())
}

/// A non-zero exit surfaces the collected diagnostics alongside the failure.
#[tokio::test]
async fn failed_compile_preserves_diagnostics() -> TestResult {
    init_tracing();
    let fx = fixture();
    let compiler = fake_compiler(
        &fx.tools,
        &[("errors.txt", "line 1: unknown symbol")],
        2,
    );
    let runner = runner(&fx, &compiler, TIMEOUT);

    let failure = runner
        .compile("let a be")
        .await
        .expect_err("compiler exited 2");

    assert_eq!(failure.exit_code(), Some(2));
    assert_eq!(failure.errors, vec!["line 1: unknown symbol".to_string()]);
    assert!(scratch_is_empty(&fx), "scratch must be disposed on failure");
    Ok(())
}

/// Scratch never survives, success or failure.
#[tokio::test]
async fn scratch_disposed_on_every_path() -> TestResult {
    init_tracing();
    let fx = fixture();
    let ok_compiler = fake_compiler(&fx.tools, &[("ir.txt", "IR")], 0);
    let runner_ok = runner(&fx, &ok_compiler, TIMEOUT);
    runner_ok.compile("x").await?;
    assert!(scratch_is_empty(&fx));

    let bad_compiler = fake_compiler(&fx.tools, &[], 1);
    let runner_bad = runner(&fx, &bad_compiler, TIMEOUT);
    runner_bad.compile("x").await.expect_err("exit 1");
    assert!(scratch_is_empty(&fx));
    Ok(())
}

/// A compiler that never finishes is killed and reported as a failure.
#[tokio::test]
async fn hung_compiler_is_killed_on_timeout() -> TestResult {
    init_tracing();
    let fx = fixture();
    let compiler = sleeping_compiler(&fx.tools);
    let runner = runner(&fx, &compiler, Duration::from_millis(200));

    let started = std::time::Instant::now();
    let failure = runner.compile("x").await.expect_err("must time out");

    assert!(matches!(failure.reason, FailureReason::TimedOut(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(scratch_is_empty(&fx), "scratch must be disposed after timeout");
    Ok(())
}

/// A missing compiler executable is a spawn failure, not a panic.
#[tokio::test]
async fn missing_compiler_is_spawn_failure() -> TestResult {
    init_tracing();
    let fx = fixture();
    let runner = runner(
        &fx,
        std::path::Path::new("/nonexistent/compiler"),
        TIMEOUT,
    );

    let failure = runner.compile("x").await.expect_err("spawn must fail");
    assert!(matches!(failure.reason, FailureReason::Spawn { .. }));
    assert!(scratch_is_empty(&fx));
    Ok(())
}

/// Non-empty generated source is persisted into the workspace on success.
#[tokio::test]
async fn generated_source_is_persisted() -> TestResult {
    init_tracing();
    let fx = fixture();
    let compiler = fake_compiler(
        &fx.tools,
        &[("c_code.txt", "#include <stdio.h>")],
        0,
    );
    let runner = runner(&fx, &compiler, TIMEOUT);

    let result = runner.compile("output 1").await?;
    assert_eq!(result.c_code, "#include <stdio.h>\n");

    let persisted = std::fs::read_to_string(fx.workspace.join("generated.c"))?;
    assert_eq!(persisted, "#include <stdio.h>\n");
    Ok(())
}

/// Generated source is NOT persisted when the compiler fails.
#[tokio::test]
async fn generated_source_not_persisted_on_failure() -> TestResult {
    init_tracing();
    let fx = fixture();
    let compiler = fake_compiler(&fx.tools, &[("c_code.txt", "int main(){}")], 1);
    let runner = runner(&fx, &compiler, TIMEOUT);

    runner.compile("x").await.expect_err("exit 1");
    assert!(!fx.workspace.join("generated.c").exists());
    Ok(())
}
