// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The matching engine: single owner of the wait queues and session table.
//!
//! One mutex serializes every queue/session mutation, so the pairing commit
//! (remove both entries, create the session, notify both sides) is one
//! critical section — there is no state where an entry is consumed but its
//! session does not exist. Outbound notifications are non-blocking channel
//! sends, so nothing suspends on I/O under the lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use tokio::sync::Mutex;

use crate::error::ErrorCode;
use crate::matching::queue::WaitQueue;
use crate::matching::session::SessionTable;
use crate::protocol::{EndReason, MatchMode, ServerMessage};
use crate::registry::{OutboundSender, Registry};

/// What `join` (and the requeue half of `skip`) resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Paired immediately; both sides were sent `match_found`.
    Matched,
    /// Waiting; the caller should reply `queued {position}`.
    Queued { position: usize },
}

/// Counters from one sweep pass, for the sweeper's debug log.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepReport {
    pub expired: usize,
    pub promoted: usize,
    pub matched: usize,
}

struct EngineState {
    queue: WaitQueue,
    sessions: SessionTable,
}

pub struct Engine {
    state: Mutex<EngineState>,
    registry: Arc<Registry>,
    queue_timeout: Duration,
    buddy_promote: Option<Duration>,
    end_on_lost_peer: bool,
}

impl Engine {
    pub fn new(
        registry: Arc<Registry>,
        queue_timeout: Duration,
        buddy_promote: Option<Duration>,
        end_on_lost_peer: bool,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState {
                queue: WaitQueue::new(),
                sessions: SessionTable::new(),
            }),
            registry,
            queue_timeout,
            buddy_promote,
            end_on_lost_peer,
        }
    }

    /// Enqueue a user and attempt an immediate match.
    pub async fn join(
        &self,
        user_id: &str,
        mode: MatchMode,
        buddy_ids: Vec<String>,
    ) -> Result<JoinOutcome, ErrorCode> {
        let mut st = self.state.lock().await;
        if st.sessions.session_of(user_id).is_some() {
            return Err(ErrorCode::AlreadyInSession);
        }
        if st.queue.contains(user_id) {
            return Err(ErrorCode::AlreadyQueued);
        }

        if self.try_pair(&mut st, user_id, mode, &buddy_ids).await {
            Ok(JoinOutcome::Matched)
        } else {
            let position = st.queue.insert(user_id, mode, buddy_ids);
            tracing::debug!(user_id, mode = mode.as_str(), position, "queued");
            Ok(JoinOutcome::Queued { position })
        }
    }

    /// Remove a waiting entry. Absent is a no-op, not an error.
    pub async fn leave(&self, user_id: &str) -> bool {
        let mut st = self.state.lock().await;
        let removed = st.queue.remove(user_id).is_some();
        if removed {
            tracing::debug!(user_id, "left queue");
        }
        removed
    }

    /// End the caller's current session and requeue only the caller, in one
    /// critical section. The skipped partner gets `partner_left` and decides
    /// on its own whether to rejoin.
    pub async fn skip(
        &self,
        session_id: &str,
        user_id: &str,
        mode: MatchMode,
    ) -> Result<JoinOutcome, ErrorCode> {
        let mut st = self.state.lock().await;
        self.end_locked(&mut st, session_id, user_id, EndReason::Skipped).await?;
        tracing::info!(session_id, user_id, "session skipped");

        if self.try_pair(&mut st, user_id, mode, &[]).await {
            Ok(JoinOutcome::Matched)
        } else {
            let position = st.queue.insert(user_id, mode, Vec::new());
            Ok(JoinOutcome::Queued { position })
        }
    }

    /// Explicitly end a session; the partner gets `session_ended`.
    pub async fn end_session(&self, session_id: &str, user_id: &str) -> Result<(), ErrorCode> {
        let mut st = self.state.lock().await;
        self.end_locked(&mut st, session_id, user_id, EndReason::PartnerEnded).await?;
        tracing::info!(session_id, user_id, "session ended");
        Ok(())
    }

    /// Relay an opaque signaling payload to the other participant.
    ///
    /// The caller must be a participant of the named live session; the
    /// target is resolved from the session record, never from the frame.
    pub async fn relay(
        &self,
        session_id: &str,
        from: &str,
        payload: serde_json::Value,
    ) -> Result<(), ErrorCode> {
        let mut st = self.state.lock().await;
        let partner = match st.sessions.get(session_id) {
            Some(s) if s.has_participant(from) => match s.partner_of(from) {
                Some(p) => p.to_owned(),
                None => return Err(ErrorCode::NotInSession),
            },
            _ => return Err(ErrorCode::NotInSession),
        };

        match self.live_sender(&partner).await {
            Some(sender) => {
                send_to(
                    &sender,
                    &ServerMessage::Signal { session_id: session_id.to_owned(), payload },
                );
                Ok(())
            }
            None if self.end_on_lost_peer => {
                if st.sessions.end(session_id).is_some() {
                    self.push(from, &EndReason::PartnerUnreachable.partner_message(session_id))
                        .await;
                    tracing::info!(session_id, target = %partner, "ended session with unreachable partner");
                }
                Ok(())
            }
            None => {
                tracing::debug!(session_id, target = %partner, "dropping signal for unreachable partner");
                Ok(())
            }
        }
    }

    /// Disconnect cascade: drop any queue entry and end any live session as
    /// a partner-disconnect. Safe to call for users with no state.
    pub async fn disconnect(&self, user_id: &str) {
        let mut st = self.state.lock().await;
        let left_queue = st.queue.remove(user_id).is_some();

        let session_id = st.sessions.session_of(user_id).map(|s| s.id.clone());
        if let Some(ref sid) = session_id {
            if let Some(ended) = st.sessions.end(sid) {
                if let Some(partner) = ended.partner_of(user_id) {
                    self.push(partner, &EndReason::PartnerDisconnected.partner_message(sid))
                        .await;
                }
            }
        }

        if left_queue || session_id.is_some() {
            tracing::info!(user_id, left_queue, ended_session = session_id.is_some(), "disconnect cleanup");
        }
    }

    /// Queue maintenance: expire overdue entries with a `queue_timeout`
    /// push, promote overdue buddies-first entries to global, and re-attempt
    /// a match for each promoted entry (the promoted side is the initiator).
    pub async fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        let mut st = self.state.lock().await;
        let mut report = SweepReport::default();

        for user in st.queue.expired(now, self.queue_timeout) {
            if st.queue.remove(&user).is_some() {
                report.expired += 1;
                self.push(&user, &ServerMessage::QueueTimeout {}).await;
            }
        }

        if let Some(delay) = self.buddy_promote {
            for user in st.queue.promotable(now, delay) {
                if !st.queue.promote(&user) {
                    continue;
                }
                report.promoted += 1;
                let buddy_ids =
                    st.queue.get(&user).map(|e| e.buddy_ids.clone()).unwrap_or_default();
                if self.try_pair(&mut st, &user, MatchMode::Global, &buddy_ids).await {
                    report.matched += 1;
                }
            }
        }

        report
    }

    /// (waiting entries, live sessions) — health endpoint and logs.
    pub async fn counts(&self) -> (usize, usize) {
        let st = self.state.lock().await;
        (st.queue.len(), st.sessions.len())
    }

    /// Scan for a live candidate and commit the pairing. Candidates whose
    /// connection died between enqueue and now are dropped and the scan
    /// continues — a session is never handed to an unreachable user.
    async fn try_pair(
        &self,
        st: &mut EngineState,
        user_id: &str,
        mode: MatchMode,
        buddy_ids: &[String],
    ) -> bool {
        loop {
            let candidate = match st.queue.find_candidate(user_id, mode, buddy_ids) {
                Some(entry) => entry.user_id.clone(),
                None => return false,
            };

            let Some(partner_sender) = self.live_sender(&candidate).await else {
                st.queue.remove(&candidate);
                tracing::debug!(user_id = %candidate, "dropped stale queue entry during pairing");
                continue;
            };

            st.queue.remove(user_id);
            if st.queue.remove(&candidate).is_none() {
                return false;
            }

            let session_id = st.sessions.create(user_id, &candidate, user_id).id.clone();
            self.push(
                user_id,
                &ServerMessage::MatchFound {
                    session_id: session_id.clone(),
                    partner_id: candidate.clone(),
                    is_initiator: true,
                },
            )
            .await;
            send_to(
                &partner_sender,
                &ServerMessage::MatchFound {
                    session_id: session_id.clone(),
                    partner_id: user_id.to_owned(),
                    is_initiator: false,
                },
            );
            tracing::info!(session_id = %session_id, initiator = user_id, partner = %candidate, "matched");
            return true;
        }
    }

    /// Shared end path for skip/end_session: validates membership, evicts,
    /// and notifies the other participant per `reason`.
    async fn end_locked(
        &self,
        st: &mut EngineState,
        session_id: &str,
        user_id: &str,
        reason: EndReason,
    ) -> Result<(), ErrorCode> {
        let valid = st
            .sessions
            .get(session_id)
            .map(|s| s.has_participant(user_id))
            .unwrap_or(false);
        if !valid {
            return Err(ErrorCode::NotInSession);
        }

        if let Some(ended) = st.sessions.end(session_id) {
            if let Some(partner) = ended.partner_of(user_id) {
                self.push(partner, &reason.partner_message(session_id)).await;
            }
        }
        Ok(())
    }

    /// A user's sender, only while its writer side is still alive.
    async fn live_sender(&self, user_id: &str) -> Option<OutboundSender> {
        self.registry.lookup(user_id).await.filter(|s| !s.is_closed())
    }

    /// Best-effort push to a user's connection, if one is live.
    async fn push(&self, user_id: &str, msg: &ServerMessage) {
        if let Some(sender) = self.registry.lookup(user_id).await {
            send_to(&sender, msg);
        }
    }
}

#[cfg(test)]
impl Engine {
    pub(crate) async fn is_queued(&self, user_id: &str) -> bool {
        self.state.lock().await.queue.contains(user_id)
    }

    pub(crate) async fn session_id_of(&self, user_id: &str) -> Option<String> {
        self.state.lock().await.sessions.session_of(user_id).map(|s| s.id.clone())
    }
}

/// Serialize and send on a connection's outbound channel. Both failure modes
/// (unserializable message, closed channel) drop the frame; the liveness
/// supervisor owns noticing dead connections.
pub fn send_to(sender: &OutboundSender, msg: &ServerMessage) {
    if let Ok(text) = serde_json::to_string(msg) {
        let _ = sender.send(Message::Text(text.into()));
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
