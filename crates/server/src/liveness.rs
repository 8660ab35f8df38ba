// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background liveness tasks: the heartbeat supervisor and the queue sweeper.
//!
//! Clients that vanish without a close frame (tab close, network loss) leave
//! ghost queue entries and orphaned sessions behind; the heartbeat supervisor
//! is what reaps them. The sweeper handles time-based queue maintenance:
//! expiry and buddies-first promotion.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message};

use crate::state::AppState;

/// Spawn the heartbeat supervisor: ping every live connection each interval
/// and evict connections with no inbound traffic past the liveness deadline,
/// running the full disconnect cascade for each.
pub fn spawn_heartbeat(state: Arc<AppState>) {
    let interval = state.config.heartbeat_interval();
    let deadline = state.config.liveness_deadline();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            for (user_id, serial) in state.registry.stale(deadline).await {
                if let Some(handle) = state.registry.unregister(&user_id, serial).await {
                    tracing::warn!(user_id = %user_id, "evicting connection after heartbeat timeout");
                    let _ = handle.sender.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "heartbeat timeout".into(),
                    })));
                    handle.cancel.cancel();
                    state.engine.disconnect(&user_id).await;
                }
            }

            for sender in state.registry.senders().await {
                let _ = sender.send(Message::Ping(vec![].into()));
            }
        }
    });
}

/// Spawn the queue sweeper: expire overdue entries and promote overdue
/// buddies-first entries on a fixed cadence.
pub fn spawn_queue_sweeper(state: Arc<AppState>) {
    let interval = state.config.sweep_interval();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let report = state.engine.sweep().await;
            if report.expired > 0 || report.promoted > 0 {
                tracing::debug!(
                    expired = report.expired,
                    promoted = report.promoted,
                    matched = report.matched,
                    "queue sweep"
                );
            }
        }
    });
}

#[cfg(test)]
#[path = "liveness_tests.rs"]
mod tests;
