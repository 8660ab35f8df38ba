// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pairctl: terminal client for a running paird server.
//!
//! Joins the matchmaking queue, prints every protocol event, and rejoins
//! after a session ends — handy for smoke tests and soak runs against a
//! live server. Signaling payloads are logged, never interpreted.

mod client;

use clap::Parser;
use tracing::error;

use paird::protocol::MatchMode;

use crate::client::ClientConfig;

#[derive(Debug, Parser)]
#[command(name = "pairctl", version, about = "Exercise a paird matchmaking server")]
struct Cli {
    /// WebSocket URL of the paird server.
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws", env = "PAIRCTL_URL")]
    url: String,

    /// User id to present; generated when omitted.
    #[arg(long, env = "PAIRCTL_USER")]
    user: Option<String>,

    /// Match mode: global or buddies_first.
    #[arg(long, default_value = "global", value_parser = parse_mode, env = "PAIRCTL_MODE")]
    mode: MatchMode,

    /// Buddy id to prefer (repeatable, implies nothing about mode).
    #[arg(long = "buddy")]
    buddies: Vec<String>,

    /// Skip and requeue this many seconds after each match.
    #[arg(long, env = "PAIRCTL_SKIP_AFTER")]
    skip_after: Option<u64>,
}

fn parse_mode(s: &str) -> Result<MatchMode, String> {
    match s {
        "global" => Ok(MatchMode::Global),
        "buddies_first" | "buddies-first" => Ok(MatchMode::BuddiesFirst),
        other => Err(format!("unknown match mode: {other}")),
    }
}

fn generated_user_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    format!("ctl-{id}")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ClientConfig {
        url: cli.url,
        user_id: cli.user.unwrap_or_else(generated_user_id),
        mode: cli.mode,
        buddy_ids: cli.buddies,
        skip_after: cli.skip_after.map(std::time::Duration::from_secs),
    };

    if let Err(e) = client::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
