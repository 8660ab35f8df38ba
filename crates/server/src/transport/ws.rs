// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket front door: per-connection actor and protocol dispatch.
//!
//! Each connection gets a reader loop (this module) and a writer task fed by
//! an unbounded mpsc channel; the registry hands the sender to anything that
//! needs to push to the client. A connection is anonymous until its first
//! frame carrying a `userId`, which binds and registers it (superseding any
//! older connection for that user).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ErrorCode;
use crate::matching::engine::send_to;
use crate::matching::JoinOutcome;
use crate::protocol::{parse_client_message, ClientMessage, ServerMessage};
use crate::registry::OutboundSender;
use crate::state::AppState;

/// The user a connection has identified itself as.
struct Binding {
    user_id: String,
    serial: u64,
}

/// `GET /ws` — WebSocket upgrade, refused past the connection cap.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if state.registry.len().await >= state.config.max_connections {
        tracing::warn!(cap = state.config.max_connections, "refusing connection at capacity");
        return axum::http::Response::builder()
            .status(503)
            .body(axum::body::Body::from("connection capacity reached"))
            .unwrap_or_default()
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(state, socket)).into_response()
}

/// Per-connection event loop.
async fn handle_connection(state: Arc<AppState>, socket: WebSocket) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let mut writer = tokio::spawn(writer_task(ws_tx, rx));

    // Cancelled when a newer connection supersedes this one, or by the
    // heartbeat supervisor on eviction.
    let cancel = CancellationToken::new();
    let mut bound: Option<Binding> = None;

    // A connection that never identifies itself is not in the registry, so
    // the heartbeat supervisor cannot reap it; this deadline does.
    let idle = tokio::time::sleep(state.config.liveness_deadline());
    tokio::pin!(idle);

    loop {
        tokio::select! {
            _ = &mut idle, if bound.is_none() => {
                tracing::debug!("closing unidentified connection after idle deadline");
                break;
            }

            _ = cancel.cancelled() => break,

            _ = state.shutdown.cancelled() => {
                send_to(&tx, &ServerMessage::ServerShutdown {
                    message: "server shutting down".to_owned(),
                });
                break;
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(b) = &bound {
                            state.registry.touch(&b.user_id).await;
                        }
                        match parse_client_message(&text) {
                            Ok(client_msg) => {
                                let reply =
                                    dispatch(&state, &tx, &cancel, &mut bound, client_msg).await;
                                if let Some(reply) = reply {
                                    send_to(&tx, &reply);
                                }
                            }
                            Err(message) => {
                                send_to(&tx, &ws_error(ErrorCode::BadRequest, &message));
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Some(b) = &bound {
                            state.registry.touch(&b.user_id).await;
                        }
                        let _ = tx.send(Message::Pong(data));
                    }
                    Some(Ok(Message::Pong(_))) => {
                        if let Some(b) = &bound {
                            state.registry.touch(&b.user_id).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Binary frames are not part of the protocol.
                    Some(Err(e)) => {
                        tracing::debug!(err = %e, "websocket receive error");
                        break;
                    }
                }
            }
        }
    }

    // Serial-guarded: if supersession or the heartbeat already unregistered
    // this connection, the cascade has run and this is a no-op.
    if let Some(b) = bound {
        if state.registry.unregister(&b.user_id, b.serial).await.is_some() {
            state.engine.disconnect(&b.user_id).await;
            tracing::info!(user_id = %b.user_id, "connection closed");
        }
    }

    // Let the writer drain queued frames (shutdown notice, close frames)
    // once every sender clone is gone, but never wait on a stuck peer.
    drop(tx);
    if tokio::time::timeout(std::time::Duration::from_secs(1), &mut writer).await.is_err() {
        writer.abort();
    }
}

/// Writer task: forwards queued messages to the WebSocket sink.
async fn writer_task(
    mut ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_tx.send(msg).await.is_err() {
            break;
        }
    }
}

/// Handle one parsed client message and optionally return a direct reply.
///
/// Asynchronous notifications (`match_found`, `partner_left`, relayed
/// `signal`s) are pushed by the engine through registry senders; everything
/// returned here goes to the sending connection only.
async fn dispatch(
    state: &AppState,
    tx: &OutboundSender,
    cancel: &CancellationToken,
    bound: &mut Option<Binding>,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    // Bind on the first identified frame; later frames must agree.
    if let Some(user_id) = msg.user_id() {
        match bound {
            Some(b) if b.user_id != user_id => {
                return Some(ws_error(
                    ErrorCode::BadRequest,
                    "userId does not match this connection",
                ));
            }
            Some(_) => {}
            None => {
                let user_id = user_id.to_owned();
                let reg = state.registry.register(&user_id, tx.clone(), cancel.clone()).await;
                if reg.superseded {
                    state.engine.disconnect(&user_id).await;
                }
                *bound = Some(Binding { user_id, serial: reg.serial });
            }
        }
    }

    match msg {
        ClientMessage::Ping => Some(ServerMessage::Pong {}),

        ClientMessage::JoinQueue(d) => {
            match state.engine.join(&d.user_id, d.match_mode, d.buddy_ids).await {
                Ok(JoinOutcome::Matched) => None,
                Ok(JoinOutcome::Queued { position }) => Some(ServerMessage::Queued { position }),
                Err(code) => Some(ws_error(code, code.default_message())),
            }
        }

        ClientMessage::LeaveQueue(d) => {
            let _ = state.engine.leave(&d.user_id).await;
            Some(ServerMessage::LeftQueue {})
        }

        ClientMessage::Skip(d) => {
            match state.engine.skip(&d.session_id, &d.user_id, d.match_mode).await {
                Ok(JoinOutcome::Matched) => None,
                Ok(JoinOutcome::Queued { position }) => Some(ServerMessage::Queued { position }),
                Err(code) => Some(ws_error(code, code.default_message())),
            }
        }

        ClientMessage::EndSession(d) => {
            match state.engine.end_session(&d.session_id, &d.user_id).await {
                Ok(()) => None,
                Err(code) => Some(ws_error(code, code.default_message())),
            }
        }

        ClientMessage::Signal(d) => {
            // The sender identity comes from the connection binding, never
            // from the frame; an unidentified connection owns no session.
            let Some(b) = bound else {
                return Some(ws_error(ErrorCode::NotInSession, "connection has not identified itself"));
            };
            match state.engine.relay(&d.session_id, &b.user_id, d.signal).await {
                Ok(()) => None,
                Err(code) => Some(ws_error(code, code.default_message())),
            }
        }
    }
}

/// Build a WebSocket error message.
fn ws_error(code: ErrorCode, message: &str) -> ServerMessage {
    ServerMessage::Error { code: code.as_str().to_owned(), message: message.to_owned() }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
