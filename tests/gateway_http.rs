// tests/gateway_http.rs

//! HTTP command surface: compile and saveFile handlers.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use codebench::artifacts::ArtifactStore;
use codebench::compile::CompilationRunner;
use codebench::exec::ExecutionManager;
use codebench::gateway::{self, AppState};
use codebench::term::TerminalBroker;
use codebench::types::WorkspaceEvent;
use codebench_test_utils::fake_tools::fake_compiler;
use codebench_test_utils::init_tracing;
use http_body_util::BodyExt;
use tokio::sync::broadcast;
use tower::ServiceExt;

type TestResult = Result<(), Box<dyn Error>>;

struct Fixture {
    _tmp: tempfile::TempDir,
    workspace: std::path::PathBuf,
    tools: std::path::PathBuf,
    scratch: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().expect("tempdir");
    let workspace = tmp.path().join("workspace");
    let tools = tmp.path().join("tools");
    let scratch = tmp.path().join("scratch");
    std::fs::create_dir_all(&workspace).unwrap();
    std::fs::create_dir_all(&tools).unwrap();
    std::fs::create_dir_all(&scratch).unwrap();
    Fixture {
        _tmp: tmp,
        workspace,
        tools,
        scratch,
    }
}

fn app_state(fx: &Fixture, compiler: &std::path::Path) -> AppState {
    let runner = Arc::new(CompilationRunner::new(
        ArtifactStore::new(&fx.scratch),
        compiler,
        &fx.workspace,
        Duration::from_secs(5),
    ));
    // The broker is deliberately left un-started; HTTP routes don't touch it.
    let broker = Arc::new(TerminalBroker::new(&fx.workspace, "/bin/sh"));
    let exec = Arc::new(ExecutionManager::new(&fx.workspace, "cc"));
    let (workspace_events, _) = broadcast::channel::<WorkspaceEvent>(16);
    AppState {
        runner,
        broker,
        exec,
        workspace_events,
        workspace: fx.workspace.clone(),
    }
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn compile_returns_artifact_json() -> TestResult {
    init_tracing();
    let fx = fixture();
    let compiler = fake_compiler(
        &fx.tools,
        &[
            ("tokens.txt", "LET\nIDENT(a)"),
            ("errors.txt", ""),
            ("output.txt", "10"),
        ],
        0,
    );
    let app = gateway::router(app_state(&fx, &compiler));

    let response = app
        .oneshot(json_post(
            "/compile",
            serde_json::json!({"code": "let a be 10\noutput a"}),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["tokens"], serde_json::json!(["LET", "IDENT(a)"]));
    assert_eq!(body["errors"], serde_json::json!([]));
    assert_eq!(body["output"], "10\n");
    assert_eq!(body["ir"], "");
    Ok(())
}

#[tokio::test]
async fn compile_failure_returns_error_with_diagnostics() -> TestResult {
    init_tracing();
    let fx = fixture();
    let compiler = fake_compiler(&fx.tools, &[("errors.txt", "line 1: unknown symbol")], 2);
    let app = gateway::router(app_state(&fx, &compiler));

    let response = app
        .oneshot(json_post("/compile", serde_json::json!({"code": "let a be"})))
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Compiler execution failed");
    assert_eq!(
        body["errors"],
        serde_json::json!(["line 1: unknown symbol"])
    );
    Ok(())
}

#[tokio::test]
async fn save_file_writes_into_the_workspace() -> TestResult {
    init_tracing();
    let fx = fixture();
    let compiler = fake_compiler(&fx.tools, &[], 0);
    let app = gateway::router(app_state(&fx, &compiler));

    let response = app
        .oneshot(json_post(
            "/files",
            serde_json::json!({"path": "sub/hello.code", "content": "output 1"}),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let written = std::fs::read_to_string(fx.workspace.join("sub/hello.code"))?;
    assert_eq!(written, "output 1");
    Ok(())
}

#[tokio::test]
async fn save_file_rejects_path_escapes() -> TestResult {
    init_tracing();
    let fx = fixture();
    let compiler = fake_compiler(&fx.tools, &[], 0);
    let app = gateway::router(app_state(&fx, &compiler));

    let response = app
        .oneshot(json_post(
            "/files",
            serde_json::json!({"path": "../outside.txt", "content": "nope"}),
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!fx._tmp.path().join("outside.txt").exists());
    Ok(())
}
