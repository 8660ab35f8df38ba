// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection registry: the single source of truth for "is this user
//! currently reachable".
//!
//! One live connection per user id. A newer connection for the same id
//! supersedes the older one: the old transport is closed and its per-user
//! state is unwound by the caller. Every connection carries a monotonic
//! serial so that teardown (socket close, heartbeat eviction, supersession)
//! cascades exactly once no matter which path notices first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Sender half of a connection's outbound channel. The connection's writer
/// task owns the receiver and forwards to the WebSocket sink, so pushes are
/// non-blocking from anywhere in the server.
pub type OutboundSender = mpsc::UnboundedSender<Message>;

/// A live connection as the registry tracks it.
pub struct ConnectionHandle {
    pub serial: u64,
    pub sender: OutboundSender,
    pub cancel: CancellationToken,
    last_seen: AtomicU64,
}

impl ConnectionHandle {
    fn touch(&self) {
        self.last_seen.store(epoch_ms(), Ordering::Relaxed);
    }
}

/// Outcome of [`Registry::register`].
pub struct Registration {
    pub serial: u64,
    /// True when an older connection for the same user was closed. The
    /// caller must unwind the old connection's queue/session state.
    pub superseded: bool,
}

#[derive(Default)]
pub struct Registry {
    connections: RwLock<HashMap<String, ConnectionHandle>>,
    next_serial: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `user_id` to a connection. Any prior connection for the id is
    /// sent a close frame and cancelled (supersession, not rejection).
    pub async fn register(
        &self,
        user_id: &str,
        sender: OutboundSender,
        cancel: CancellationToken,
    ) -> Registration {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = ConnectionHandle { serial, sender, cancel, last_seen: AtomicU64::new(0) };
        handle.touch();

        let old = {
            let mut connections = self.connections.write().await;
            connections.insert(user_id.to_owned(), handle)
        };

        let superseded = match old {
            Some(old) => {
                let _ = old.sender.send(Message::Close(Some(CloseFrame {
                    code: 1000,
                    reason: "superseded by a newer connection".into(),
                })));
                old.cancel.cancel();
                tracing::info!(user_id, old_serial = old.serial, "connection superseded");
                true
            }
            None => false,
        };

        Registration { serial, superseded }
    }

    /// Clone the live sender for a user, if any.
    pub async fn lookup(&self, user_id: &str) -> Option<OutboundSender> {
        self.connections.read().await.get(user_id).map(|h| h.sender.clone())
    }

    /// Remove the mapping if `serial` still identifies the live connection.
    ///
    /// Returns the removed handle on the first matching call and `None` on
    /// every other — double-unregister and unregister-after-supersession are
    /// no-ops, which keeps the disconnect cascade idempotent.
    pub async fn unregister(&self, user_id: &str, serial: u64) -> Option<ConnectionHandle> {
        let mut connections = self.connections.write().await;
        match connections.get(user_id) {
            Some(h) if h.serial == serial => connections.remove(user_id),
            _ => None,
        }
    }

    /// Refresh last-seen for a user's connection.
    pub async fn touch(&self, user_id: &str) {
        if let Some(h) = self.connections.read().await.get(user_id) {
            h.touch();
        }
    }

    /// Connections with no inbound traffic for longer than `deadline`.
    pub async fn stale(&self, deadline: Duration) -> Vec<(String, u64)> {
        let cutoff = epoch_ms().saturating_sub(deadline.as_millis() as u64);
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, h)| h.last_seen.load(Ordering::Relaxed) < cutoff)
            .map(|(id, h)| (id.clone(), h.serial))
            .collect()
    }

    /// Senders for every live connection (heartbeat ping fan-out).
    pub async fn senders(&self) -> Vec<OutboundSender> {
        self.connections.read().await.values().map(|h| h.sender.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
