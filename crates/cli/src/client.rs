// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use paird::protocol::{MatchMode, ServerMessage};

pub struct ClientConfig {
    pub url: String,
    pub user_id: String,
    pub mode: MatchMode,
    pub buddy_ids: Vec<String>,
    pub skip_after: Option<Duration>,
}

/// Build a `join_queue` client frame.
pub fn join_frame(user_id: &str, mode: MatchMode, buddy_ids: &[String]) -> String {
    serde_json::json!({
        "type": "join_queue",
        "data": { "userId": user_id, "matchMode": mode.as_str(), "buddyIds": buddy_ids },
    })
    .to_string()
}

/// Build a `skip` client frame.
pub fn skip_frame(session_id: &str, user_id: &str, mode: MatchMode) -> String {
    serde_json::json!({
        "type": "skip",
        "data": { "sessionId": session_id, "userId": user_id, "matchMode": mode.as_str() },
    })
    .to_string()
}

/// Run the client until the server shuts down or the connection drops.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let (mut ws, _) = connect_async(&config.url)
        .await
        .with_context(|| format!("connecting to {}", config.url))?;
    info!(url = %config.url, user_id = %config.user_id, mode = config.mode.as_str(), "connected");

    ws.send(Message::text(join_frame(&config.user_id, config.mode, &config.buddy_ids)))
        .await
        .context("sending join_queue")?;

    let mut session: Option<String> = None;
    let mut skip_at: Option<tokio::time::Instant> = None;

    loop {
        tokio::select! {
            _ = async {
                match skip_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {
                skip_at = None;
                if let Some(ref sid) = session {
                    info!(session_id = %sid, "skipping");
                    ws.send(Message::text(skip_frame(sid, &config.user_id, config.mode)))
                        .await
                        .context("sending skip")?;
                    session = None;
                }
            }

            frame = ws.next() => {
                let msg = match frame {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => anyhow::bail!("websocket error: {e}"),
                    None => {
                        info!("connection closed by server");
                        return Ok(());
                    }
                };

                match msg {
                    Message::Text(text) => {
                        let parsed: ServerMessage = match serde_json::from_str(&text) {
                            Ok(p) => p,
                            Err(e) => {
                                warn!(err = %e, frame = %text, "unparseable server frame");
                                continue;
                            }
                        };
                        let rejoin = handle_event(parsed, &mut session, &mut skip_at, config.skip_after);
                        match rejoin {
                            Reaction::Rejoin => {
                                ws.send(Message::text(join_frame(
                                    &config.user_id,
                                    config.mode,
                                    &config.buddy_ids,
                                )))
                                .await
                                .context("rejoining queue")?;
                            }
                            Reaction::Exit => return Ok(()),
                            Reaction::None => {}
                        }
                    }
                    Message::Ping(data) => {
                        ws.send(Message::Pong(data)).await.context("answering ping")?;
                    }
                    Message::Close(_) => {
                        info!("connection closed by server");
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }
    }
}

enum Reaction {
    None,
    Rejoin,
    Exit,
}

/// Log one server event and decide whether to rejoin the queue or exit.
fn handle_event(
    msg: ServerMessage,
    session: &mut Option<String>,
    skip_at: &mut Option<tokio::time::Instant>,
    skip_after: Option<Duration>,
) -> Reaction {
    match msg {
        ServerMessage::Queued { position } => {
            info!(position, "queued");
            Reaction::None
        }
        ServerMessage::MatchFound { session_id, partner_id, is_initiator } => {
            info!(session_id = %session_id, partner_id = %partner_id, is_initiator, "matched");
            *session = Some(session_id);
            *skip_at = skip_after.map(|d| tokio::time::Instant::now() + d);
            Reaction::None
        }
        ServerMessage::Signal { session_id, payload } => {
            debug!(session_id = %session_id, bytes = payload.to_string().len(), "signal");
            Reaction::None
        }
        ServerMessage::PartnerLeft { session_id } => {
            info!(session_id = %session_id, "partner left, rejoining");
            *session = None;
            *skip_at = None;
            Reaction::Rejoin
        }
        ServerMessage::SessionEnded { session_id, reason } => {
            info!(session_id = %session_id, reason = %reason, "session ended, rejoining");
            *session = None;
            *skip_at = None;
            Reaction::Rejoin
        }
        ServerMessage::QueueTimeout {} => {
            warn!("queue timed out, rejoining");
            Reaction::Rejoin
        }
        ServerMessage::LeftQueue {} => {
            info!("left queue");
            Reaction::None
        }
        ServerMessage::Error { code, message } => {
            warn!(code = %code, message = %message, "server error");
            Reaction::None
        }
        ServerMessage::Pong {} => {
            debug!("pong");
            Reaction::None
        }
        ServerMessage::ServerShutdown { message } => {
            info!(message = %message, "server shutting down");
            Reaction::Exit
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
