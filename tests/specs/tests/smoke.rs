// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `paird` binary and drive the
//! matchmaking protocol over live WebSocket connections.

use std::time::Duration;

use paird::protocol::ServerMessage;
use paird_specs::{match_pair, PairdProcess, WsClient};

const TIMEOUT: Duration = Duration::from_secs(10);

// -- HTTP ---------------------------------------------------------------------

#[tokio::test]
async fn health_reports_running() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let health = server.health().await?;
    assert_eq!(health["status"], "running");
    assert_eq!(health["connections"], 0);
    assert_eq!(health["queue_size"], 0);
    assert_eq!(health["active_sessions"], 0);
    assert!(health["uptime_secs"].is_number());
    Ok(())
}

// -- Queueing and pairing -----------------------------------------------------

#[tokio::test]
async fn two_global_joins_match_instantly() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;
    let mut b = WsClient::connect(&server, "bob").await?;
    let _sid = match_pair(&mut a, &mut b).await?;

    let health = server.health().await?;
    assert_eq!(health["connections"], 2);
    assert_eq!(health["queue_size"], 0);
    assert_eq!(health["active_sessions"], 1);
    Ok(())
}

#[tokio::test]
async fn lone_joiner_waits_at_position_one() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;
    a.join_queue("global", &[]).await?;
    match a.recv().await? {
        ServerMessage::Queued { position } => assert_eq!(position, 1),
        other => anyhow::bail!("expected queued, got {other:?}"),
    }

    // No match arrives until someone else joins.
    a.expect_silence(Duration::from_millis(300)).await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_join_is_rejected() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;
    a.join_queue("global", &[]).await?;
    let _ = a.recv().await?;

    a.join_queue("global", &[]).await?;
    match a.recv().await? {
        ServerMessage::Error { code, message } => {
            assert_eq!(code, "ALREADY_QUEUED");
            assert_eq!(message, "already queued");
        }
        other => anyhow::bail!("expected error, got {other:?}"),
    }

    let health = server.health().await?;
    assert_eq!(health["queue_size"], 1);
    Ok(())
}

#[tokio::test]
async fn leave_queue_acks_and_clears_the_entry() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;
    a.join_queue("global", &[]).await?;
    let _ = a.recv().await?;

    a.leave_queue().await?;
    match a.recv().await? {
        ServerMessage::LeftQueue {} => {}
        other => anyhow::bail!("expected left_queue, got {other:?}"),
    }

    let health = server.health().await?;
    assert_eq!(health["queue_size"], 0);
    Ok(())
}

#[tokio::test]
async fn symmetric_buddy_match() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    // alice waits buddies-first and lists bob; bob joins plain global.
    let mut a = WsClient::connect(&server, "alice").await?;
    a.join_queue("buddies_first", &["bob"]).await?;
    match a.recv().await? {
        ServerMessage::Queued { .. } => {}
        other => anyhow::bail!("expected queued, got {other:?}"),
    }

    let mut b = WsClient::connect(&server, "bob").await?;
    b.join_queue("global", &[]).await?;

    match a.recv().await? {
        ServerMessage::MatchFound { partner_id, .. } => assert_eq!(partner_id, "bob"),
        other => anyhow::bail!("a expected match_found, got {other:?}"),
    }
    match b.recv().await? {
        ServerMessage::MatchFound { partner_id, .. } => assert_eq!(partner_id, "alice"),
        other => anyhow::bail!("b expected match_found, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn buddies_first_is_promoted_to_global_after_the_delay() -> anyhow::Result<()> {
    let server = PairdProcess::start_with(&["--buddy-promote-ms", "200", "--sweep-ms", "50"])?;
    server.wait_healthy(TIMEOUT).await?;

    // No buddy relation between the two; only promotion can pair them.
    let mut a = WsClient::connect(&server, "alice").await?;
    a.join_queue("buddies_first", &[]).await?;
    let _ = a.recv().await?;

    let mut b = WsClient::connect(&server, "bob").await?;
    b.join_queue("global", &[]).await?;
    let _ = b.recv().await?;

    match a.recv().await? {
        ServerMessage::MatchFound { partner_id, .. } => assert_eq!(partner_id, "bob"),
        other => anyhow::bail!("a expected match_found after promotion, got {other:?}"),
    }
    match b.recv().await? {
        ServerMessage::MatchFound { partner_id, .. } => assert_eq!(partner_id, "alice"),
        other => anyhow::bail!("b expected match_found after promotion, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn queue_times_out_with_a_notification() -> anyhow::Result<()> {
    let server = PairdProcess::start_with(&["--queue-timeout-ms", "200", "--sweep-ms", "50"])?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;
    a.join_queue("global", &[]).await?;
    match a.recv().await? {
        ServerMessage::Queued { .. } => {}
        other => anyhow::bail!("expected queued, got {other:?}"),
    }

    match a.recv().await? {
        ServerMessage::QueueTimeout {} => {}
        other => anyhow::bail!("expected queue_timeout, got {other:?}"),
    }
    let health = server.health().await?;
    assert_eq!(health["queue_size"], 0);
    Ok(())
}

// -- Session lifecycle --------------------------------------------------------

#[tokio::test]
async fn skip_requeues_only_the_skipper() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;
    let mut b = WsClient::connect(&server, "bob").await?;
    let sid = match_pair(&mut a, &mut b).await?;

    a.skip(&sid, "global").await?;
    match b.recv().await? {
        ServerMessage::PartnerLeft { session_id } => assert_eq!(session_id, sid),
        other => anyhow::bail!("b expected partner_left, got {other:?}"),
    }
    match a.recv().await? {
        ServerMessage::Queued { position } => assert_eq!(position, 1),
        other => anyhow::bail!("a expected queued, got {other:?}"),
    }

    // The skipped partner is not requeued.
    let health = server.health().await?;
    assert_eq!(health["queue_size"], 1);
    assert_eq!(health["active_sessions"], 0);

    // A third joiner pairs with the skipper under a fresh session id.
    let mut c = WsClient::connect(&server, "carol").await?;
    c.join_queue("global", &[]).await?;
    match a.recv().await? {
        ServerMessage::MatchFound { session_id, partner_id, .. } => {
            assert_ne!(session_id, sid);
            assert_eq!(partner_id, "carol");
        }
        other => anyhow::bail!("a expected a fresh match, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn explicit_end_notifies_the_partner() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;
    let mut b = WsClient::connect(&server, "bob").await?;
    let sid = match_pair(&mut a, &mut b).await?;

    a.end_session(&sid).await?;
    match b.recv().await? {
        ServerMessage::SessionEnded { session_id, reason } => {
            assert_eq!(session_id, sid);
            assert_eq!(reason, "partner_ended");
        }
        other => anyhow::bail!("b expected session_ended, got {other:?}"),
    }

    let health = server.health().await?;
    assert_eq!(health["active_sessions"], 0);
    Ok(())
}

#[tokio::test]
async fn abrupt_disconnect_notifies_partner_and_kills_the_session() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;
    let mut b = WsClient::connect(&server, "bob").await?;
    let sid = match_pair(&mut a, &mut b).await?;

    a.drop_connection();
    match b.recv().await? {
        ServerMessage::PartnerLeft { session_id } => assert_eq!(session_id, sid),
        other => anyhow::bail!("b expected partner_left, got {other:?}"),
    }

    // Signaling into the dead session is a state error now.
    b.signal(&sid, "alice", serde_json::json!({"type": "candidate"})).await?;
    match b.recv().await? {
        ServerMessage::Error { code, .. } => assert_eq!(code, "NOT_IN_SESSION"),
        other => anyhow::bail!("b expected error, got {other:?}"),
    }
    Ok(())
}

// -- Signaling ----------------------------------------------------------------

#[tokio::test]
async fn signal_relays_payloads_untouched() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;
    let mut b = WsClient::connect(&server, "bob").await?;
    let sid = match_pair(&mut a, &mut b).await?;

    let offer = serde_json::json!({
        "type": "offer",
        "sdp": "v=0\r\no=- 46117317 2 IN IP4 127.0.0.1\r\n",
        "extras": {"trickle": true, "mids": [0, 1]},
    });
    a.signal(&sid, "bob", offer.clone()).await?;
    match b.recv().await? {
        ServerMessage::Signal { session_id, payload } => {
            assert_eq!(session_id, sid);
            assert_eq!(payload, offer);
        }
        other => anyhow::bail!("b expected signal, got {other:?}"),
    }

    let answer = serde_json::json!({"type": "answer", "sdp": "v=0\r\n"});
    b.signal(&sid, "alice", answer.clone()).await?;
    match a.recv().await? {
        ServerMessage::Signal { payload, .. } => assert_eq!(payload, answer),
        other => anyhow::bail!("a expected signal, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn outsiders_cannot_signal_into_a_session() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;
    let mut b = WsClient::connect(&server, "bob").await?;
    let sid = match_pair(&mut a, &mut b).await?;

    // mallory identifies herself via a queue join, then injects into a/b's
    // session. She gets a state error; neither participant sees anything.
    let mut m = WsClient::connect(&server, "mallory").await?;
    m.join_queue("global", &[]).await?;
    let _ = m.recv().await?;

    m.signal(&sid, "bob", serde_json::json!({"sdp": "intrusion"})).await?;
    match m.recv().await? {
        ServerMessage::Error { code, .. } => assert_eq!(code, "NOT_IN_SESSION"),
        other => anyhow::bail!("mallory expected error, got {other:?}"),
    }
    a.expect_silence(Duration::from_millis(300)).await?;
    b.expect_silence(Duration::from_millis(300)).await?;
    Ok(())
}

// -- Protocol hygiene ---------------------------------------------------------

#[tokio::test]
async fn ping_pong_and_malformed_frames() -> anyhow::Result<()> {
    let server = PairdProcess::start()?;
    server.wait_healthy(TIMEOUT).await?;

    let mut a = WsClient::connect(&server, "alice").await?;

    a.send_raw(r#"{"type":"ping"}"#).await?;
    match a.recv().await? {
        ServerMessage::Pong {} => {}
        other => anyhow::bail!("expected pong, got {other:?}"),
    }

    // Garbage gets an error and the connection survives.
    a.send_raw("{this is not json").await?;
    match a.recv().await? {
        ServerMessage::Error { code, .. } => assert_eq!(code, "BAD_REQUEST"),
        other => anyhow::bail!("expected error, got {other:?}"),
    }

    a.send_raw(r#"{"type":"teleport","data":{}}"#).await?;
    match a.recv().await? {
        ServerMessage::Error { message, .. } => {
            assert_eq!(message, "unknown message type: teleport");
        }
        other => anyhow::bail!("expected error, got {other:?}"),
    }

    a.send_raw(r#"{"type":"ping"}"#).await?;
    match a.recv().await? {
        ServerMessage::Pong {} => {}
        other => anyhow::bail!("expected pong after errors, got {other:?}"),
    }
    Ok(())
}
