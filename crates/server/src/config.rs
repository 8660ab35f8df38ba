// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the paird matchmaking server.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "PAIRD_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "PAIRD_PORT")]
    pub port: u16,

    /// Heartbeat ping interval in milliseconds.
    #[arg(long, default_value_t = 30000, env = "PAIRD_HEARTBEAT_MS")]
    pub heartbeat_ms: u64,

    /// Missed heartbeat intervals before a connection is considered dead.
    #[arg(long, default_value_t = 2, env = "PAIRD_HEARTBEAT_MISSES")]
    pub heartbeat_misses: u32,

    /// Max wait in the queue before an entry expires, in milliseconds.
    #[arg(long, default_value_t = 120_000, env = "PAIRD_QUEUE_TIMEOUT_MS")]
    pub queue_timeout_ms: u64,

    /// Wait before a buddies-first entry is promoted to the global queue,
    /// in milliseconds. 0 disables promotion.
    #[arg(long, default_value_t = 30000, env = "PAIRD_BUDDY_PROMOTE_MS")]
    pub buddy_promote_ms: u64,

    /// Queue expiry/promotion sweep interval in milliseconds.
    #[arg(long, default_value_t = 5000, env = "PAIRD_SWEEP_MS")]
    pub sweep_ms: u64,

    /// Max concurrent WebSocket connections; upgrades past this are refused.
    #[arg(long, default_value_t = 10240, env = "PAIRD_MAX_CONNECTIONS")]
    pub max_connections: usize,

    /// End a session immediately when a signal cannot reach the partner,
    /// instead of dropping the relay and leaving eviction to the heartbeat.
    #[arg(long, env = "PAIRD_END_ON_LOST_PEER")]
    pub end_on_lost_peer: bool,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, env = "PAIRD_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.heartbeat_ms)
    }

    /// A connection with no inbound traffic for this long is dead.
    pub fn liveness_deadline(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.heartbeat_ms * u64::from(self.heartbeat_misses))
    }

    pub fn queue_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn buddy_promote(&self) -> Option<std::time::Duration> {
        (self.buddy_promote_ms > 0)
            .then(|| std::time::Duration::from_millis(self.buddy_promote_ms))
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sweep_ms)
    }
}
