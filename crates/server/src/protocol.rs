// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the matchmaking WebSocket protocol.
//!
//! Both directions are JSON text frames. Client frames are
//! `{"type": ..., "data": {...}}` and are dispatched on the type tag into
//! typed payload structs; server frames are `{"type": ..., "payload": {...}}`
//! serialized from a single adjacently-tagged enum. Type tags are
//! snake_case, payload fields camelCase (the consuming client is a browser
//! hook).

use serde::{Deserialize, Serialize};

/// Queue partition selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Global,
    BuddiesFirst,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::BuddiesFirst => "buddies_first",
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Raw client frame before payload typing.
#[derive(Debug, Deserialize)]
struct ClientEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQueueData {
    pub user_id: String,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub buddy_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveQueueData {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipData {
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub match_mode: MatchMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionData {
    pub session_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalData {
    pub session_id: String,
    /// Advisory only — the relay target is resolved from the session record,
    /// never from this field.
    #[serde(default)]
    pub target_user_id: Option<String>,
    /// Opaque signaling payload (SDP, ICE, app markers). Never parsed.
    pub signal: serde_json::Value,
}

#[derive(Debug, Clone)]
pub enum ClientMessage {
    JoinQueue(JoinQueueData),
    LeaveQueue(LeaveQueueData),
    Skip(SkipData),
    EndSession(EndSessionData),
    Signal(SignalData),
    Ping,
}

impl ClientMessage {
    /// The `userId` the frame claims to act for, when it carries one.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::JoinQueue(d) => Some(&d.user_id),
            Self::LeaveQueue(d) => Some(&d.user_id),
            Self::Skip(d) => Some(&d.user_id),
            Self::EndSession(d) => Some(&d.user_id),
            Self::Signal(_) | Self::Ping => None,
        }
    }
}

/// Parse one client text frame.
///
/// The error string is sent back verbatim in an `error {message}` reply, so
/// it names the offending type tag and field rather than a serde code path.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, String> {
    let envelope: ClientEnvelope =
        serde_json::from_str(text).map_err(|_| "invalid JSON frame".to_owned())?;

    fn data<T: serde::de::DeserializeOwned>(
        kind: &str,
        value: serde_json::Value,
    ) -> Result<T, String> {
        serde_json::from_value(value).map_err(|e| format!("{kind}: {e}"))
    }

    match envelope.kind.as_str() {
        "join_queue" => Ok(ClientMessage::JoinQueue(data("join_queue", envelope.data)?)),
        "leave_queue" => Ok(ClientMessage::LeaveQueue(data("leave_queue", envelope.data)?)),
        "skip" => Ok(ClientMessage::Skip(data("skip", envelope.data)?)),
        "end_session" => Ok(ClientMessage::EndSession(data("end_session", envelope.data)?)),
        "signal" => Ok(ClientMessage::Signal(data("signal", envelope.data)?)),
        "ping" => Ok(ClientMessage::Ping),
        other => Err(format!("unknown message type: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Queued { position: usize },
    #[serde(rename_all = "camelCase")]
    MatchFound { session_id: String, partner_id: String, is_initiator: bool },
    #[serde(rename_all = "camelCase")]
    Signal { session_id: String, payload: serde_json::Value },
    #[serde(rename_all = "camelCase")]
    PartnerLeft { session_id: String },
    #[serde(rename_all = "camelCase")]
    SessionEnded { session_id: String, reason: String },
    QueueTimeout {},
    LeftQueue {},
    Error { code: String, message: String },
    Pong {},
    ServerShutdown { message: String },
}

/// Why a session ended, as carried in `session_ended {reason}` and chosen
/// between `partner_left` and `session_ended` on the partner side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    PartnerEnded,
    PartnerDisconnected,
    Skipped,
    PartnerUnreachable,
    ServerShutdown,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PartnerEnded => "partner_ended",
            Self::PartnerDisconnected => "partner_disconnected",
            Self::Skipped => "skipped",
            Self::PartnerUnreachable => "partner_unreachable",
            Self::ServerShutdown => "server_shutdown",
        }
    }

    /// The message the *other* participant receives when a session ends this
    /// way. Skips and disconnects read as the partner walking away; explicit
    /// ends and policy teardowns carry the reason.
    pub fn partner_message(&self, session_id: &str) -> ServerMessage {
        match self {
            Self::Skipped | Self::PartnerDisconnected => {
                ServerMessage::PartnerLeft { session_id: session_id.to_owned() }
            }
            Self::PartnerEnded | Self::PartnerUnreachable | Self::ServerShutdown => {
                ServerMessage::SessionEnded {
                    session_id: session_id.to_owned(),
                    reason: self.as_str().to_owned(),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
