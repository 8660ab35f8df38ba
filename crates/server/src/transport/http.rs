// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
    pub queue_size: usize,
    pub active_sessions: usize,
    pub uptime_secs: u64,
}

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let (queue_size, active_sessions) = s.engine.counts().await;
    Json(HealthResponse {
        status: "running".to_owned(),
        connections: s.registry.len().await,
        queue_size,
        active_sessions,
        uptime_secs: s.started_at.elapsed().as_secs(),
    })
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
