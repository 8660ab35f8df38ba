// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes surfaced on the WebSocket protocol as `error {code, message}`.
///
/// Protocol errors (malformed frames) and state errors (invalid transitions)
/// both land here; the connection stays open in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    BadRequest,
    AlreadyQueued,
    AlreadyInSession,
    NotInSession,
    ServerFull,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::AlreadyQueued => "ALREADY_QUEUED",
            Self::AlreadyInSession => "ALREADY_IN_SESSION",
            Self::NotInSession => "NOT_IN_SESSION",
            Self::ServerFull => "SERVER_FULL",
            Self::Internal => "INTERNAL",
        }
    }

    /// Default human-readable message for states the client can run into
    /// without any field-level detail to report.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad request",
            Self::AlreadyQueued => "already queued",
            Self::AlreadyInSession => "already in a session",
            Self::NotInSession => "not a participant of that session",
            Self::ServerFull => "server at connection capacity",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
