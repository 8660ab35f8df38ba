// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::matching::Engine;
use crate::registry::Registry;

/// Shared server state.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<Registry>,
    pub engine: Arc<Engine>,
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, shutdown: CancellationToken) -> Self {
        let registry = Arc::new(Registry::new());
        let engine = Arc::new(Engine::new(
            Arc::clone(&registry),
            config.queue_timeout(),
            config.buddy_promote(),
            config.end_on_lost_peer,
        ));
        Self { config, registry, engine, shutdown, started_at: Instant::now() }
    }
}
