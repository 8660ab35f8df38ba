// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the matchmaking server.

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the axum `Router` with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health (status + queue/session/connection counts)
        .route("/api/v1/health", get(http::health))
        // WebSocket front door; the reference client dials the bare origin,
        // so the root path upgrades too
        .route("/ws", get(ws::ws_handler))
        .route("/", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
