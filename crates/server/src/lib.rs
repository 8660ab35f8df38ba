// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Paird: real-time 1:1 matchmaking and WebRTC-signaling relay.

pub mod config;
pub mod error;
pub mod liveness;
pub mod matching;
pub mod protocol;
pub mod registry;
pub mod state;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::state::AppState;

/// Run the matchmaking server until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(config, shutdown.clone()));

    spawn_signal_handler(shutdown.clone());
    liveness::spawn_heartbeat(Arc::clone(&state));
    liveness::spawn_queue_sweeper(Arc::clone(&state));

    let router = transport::build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("paird listening on {addr}");

    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}

/// Cancel the shutdown token on SIGTERM/SIGINT. Every connection observes
/// the token, pushes `server_shutdown`, and unwinds before serve returns.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                tracing::info!("received SIGTERM");
                shutdown.cancel();
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                tracing::info!("received SIGINT");
                shutdown.cancel();
            }
        }
    });
}
