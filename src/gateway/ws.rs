// src/gateway/ws.rs

//! Per-observer WebSocket session.
//!
//! Each connection gets a fresh observer id, a terminal subscription, a
//! workspace event subscription, and a private execution event channel. One
//! select loop relays both directions until the socket closes; teardown
//! unsubscribes the observer and kills any run it still owns.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::exec::{ExecutionEvent, ExecutionInput};
use crate::gateway::protocol::{ClientMessage, ServerMessage};
use crate::gateway::AppState;
use crate::term::TerminalEvent;
use crate::types::ObserverId;

const EXEC_EVENT_CAPACITY: usize = 256;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let observer: ObserverId = Uuid::new_v4();
    info!(observer = %observer, "observer connected");

    let mut term_rx = state.broker.subscribe(observer);
    let mut watch_rx = state.workspace_events.subscribe();
    let (exec_tx, mut exec_rx) = mpsc::channel::<ExecutionEvent>(EXEC_EVENT_CAPACITY);
    let mut exec_input: Option<ExecutionInput> = None;

    let (mut sink, mut stream) = socket.split();

    // Guard flags disable a select arm once its source channel closes.
    let mut term_open = true;
    let mut watch_open = true;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(
                            &state,
                            observer,
                            text.as_str(),
                            &exec_tx,
                            &mut exec_input,
                        );
                        if let Some(reply) = reply {
                            if send(&mut sink, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(observer = %observer, error = %e, "websocket read error");
                        break;
                    }
                }
            }

            event = term_rx.recv(), if term_open => {
                let message = match event {
                    Ok(TerminalEvent::Data(bytes)) => Some(ServerMessage::TerminalData {
                        data: String::from_utf8_lossy(&bytes).into_owned(),
                    }),
                    Ok(TerminalEvent::Closed) => Some(ServerMessage::TerminalClosed),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(observer = %observer, skipped, "observer lagged behind terminal output");
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        term_open = false;
                        None
                    }
                };
                if let Some(message) = message {
                    if send(&mut sink, &message).await.is_err() {
                        break;
                    }
                }
            }

            event = watch_rx.recv(), if watch_open => {
                let message = match event {
                    Ok(event) => Some(ServerMessage::WorkspaceRefresh {
                        kind: event.kind,
                        path: event.path.display().to_string(),
                    }),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(observer = %observer, skipped, "observer lagged behind workspace events");
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        watch_open = false;
                        None
                    }
                };
                if let Some(message) = message {
                    if send(&mut sink, &message).await.is_err() {
                        break;
                    }
                }
            }

            Some(event) = exec_rx.recv() => {
                let message = match event {
                    ExecutionEvent::Data { bytes, stream } => ServerMessage::ExecutionData {
                        data: String::from_utf8_lossy(&bytes).into_owned(),
                        channel: stream,
                    },
                    ExecutionEvent::Exited { code } => {
                        exec_input = None;
                        ServerMessage::ExecutionExited { code }
                    }
                };
                if send(&mut sink, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    state.broker.unsubscribe(observer);
    state.exec.abort(observer);
    info!(observer = %observer, "observer disconnected");
}

/// Route one inbound command. Returns a message to send back, if any.
fn handle_client_message(
    state: &AppState,
    observer: ObserverId,
    text: &str,
    exec_tx: &mpsc::Sender<ExecutionEvent>,
    exec_input: &mut Option<ExecutionInput>,
) -> Option<ServerMessage> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            return Some(ServerMessage::Error {
                error: "Invalid message".to_string(),
                details: e.to_string(),
            });
        }
    };

    match message {
        ClientMessage::TerminalWrite { data } => {
            if let Err(e) = state.broker.write(data.into_bytes()) {
                return Some(ServerMessage::Error {
                    error: "Terminal write failed".to_string(),
                    details: e.to_string(),
                });
            }
            None
        }
        ClientMessage::ExecutionWrite { data } => match exec_input {
            Some(input) => {
                input.write(data.into_bytes());
                None
            }
            None => Some(ServerMessage::Error {
                error: "No active run".to_string(),
                details: "executionWrite requires a running program".to_string(),
            }),
        },
        ClientMessage::RunLowLevel => {
            match state.exec.start_run(observer, exec_tx.clone()) {
                Ok(input) => {
                    *exec_input = Some(input);
                    None
                }
                Err(e) => Some(ServerMessage::Error {
                    error: "Run rejected".to_string(),
                    details: e.to_string(),
                }),
            }
        }
    }
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize server message");
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await
}
