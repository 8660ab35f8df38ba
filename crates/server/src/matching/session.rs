// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Active session table.
//!
//! A session is created the instant two queue entries are paired and lives
//! until someone ends, skips, or disconnects. The `by_user` index is what
//! makes "a user participates in at most one live session" structural: every
//! create/end goes through it.

use std::collections::HashMap;
use std::time::Instant;

/// Server-side session state. `connecting` is all the server ever asserts;
/// "connected" is the client's own inference once WebRTC negotiation
/// completes, and ended sessions are evicted immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Ended,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    /// Exactly one participant creates the WebRTC offer.
    pub initiator: String,
    pub state: SessionState,
    pub created_at: Instant,
}

impl Session {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        if self.user_a == user_id {
            Some(&self.user_b)
        } else if self.user_b == user_id {
            Some(&self.user_a)
        } else {
            None
        }
    }
}

#[derive(Default)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
    by_user: HashMap<String, String>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a freshly paired couple. Caller guarantees
    /// neither user is in a live session (the engine checks before pairing).
    pub fn create(&mut self, user_a: &str, user_b: &str, initiator: &str) -> &Session {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Session {
            id: id.clone(),
            user_a: user_a.to_owned(),
            user_b: user_b.to_owned(),
            initiator: initiator.to_owned(),
            state: SessionState::Connecting,
            created_at: Instant::now(),
        };
        self.by_user.insert(user_a.to_owned(), id.clone());
        self.by_user.insert(user_b.to_owned(), id.clone());
        self.sessions.entry(id).or_insert(session)
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    /// The live session a user participates in, if any.
    pub fn session_of(&self, user_id: &str) -> Option<&Session> {
        self.by_user.get(user_id).and_then(|id| self.sessions.get(id))
    }

    /// Transition to `ended` and evict. Returns the ended session so the
    /// caller can notify the other participant; `None` if the id is unknown
    /// (end/skip/disconnect racing each other is normal, not an error).
    pub fn end(&mut self, session_id: &str) -> Option<Session> {
        let mut session = self.sessions.remove(session_id)?;
        session.state = SessionState::Ended;
        self.by_user.remove(&session.user_a);
        self.by_user.remove(&session.user_b);
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
