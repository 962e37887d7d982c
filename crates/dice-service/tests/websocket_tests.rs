//! End-to-end tests for room WebSockets.
//!
//! Every test runs a real server on a random port and drives it with
//! `TestRollerClient` connections.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use dice_service::actors::{RollResults, UsersUpdateInfo};
use dice_service::protocol::ServerMessage;
use dice_test_utils::{TestDiceServer, TestRollerClient};
use std::collections::HashMap;
use std::time::Duration;

fn users(self_name: &str, others: &[&str]) -> ServerMessage {
    ServerMessage::UsersUpdate(UsersUpdateInfo {
        self_name: self_name.to_string(),
        others: others.iter().map(ToString::to_string).collect(),
    })
}

async fn next_roll(client: &mut TestRollerClient) -> Result<RollResults> {
    match client.next_message().await? {
        ServerMessage::Roll(results) => Ok(results),
        other => anyhow::bail!("expected roll, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_room_session() -> Result<()> {
    let server = TestDiceServer::spawn().await?;

    // Empty request gets a generated name
    let room = server.create_room("").await?;
    assert!(!room.is_empty());
    assert!(server.registry().exists(&room).await);

    let url = server.ws_url(&room);

    let mut first = TestRollerClient::join_room(&url, "alice").await?;
    assert_eq!(first.next_message().await?, users("alice", &[]));

    let mut second = TestRollerClient::join_room(&url, "alice").await?;
    assert_eq!(second.next_message().await?, users("alice-1", &["alice"]));
    assert_eq!(first.next_message().await?, users("alice", &["alice-1"]));

    second.roll(&[6, 6, 1]).await?;
    for client in [&mut first, &mut second] {
        let results = next_roll(client).await?;
        assert_eq!(results.name, "alice-1");
        assert_eq!(results.results.len(), 2);
        for result in &results.results {
            assert_eq!(result.dice, 6);
            assert!((1..=6).contains(&result.result));
        }
    }

    first.close().await?;
    assert_eq!(second.next_message().await?, users("alice-1", &[]));

    Ok(())
}

#[tokio::test]
async fn test_unknown_room_gets_error_and_close() -> Result<()> {
    let server = TestDiceServer::spawn().await?;

    let mut client = TestRollerClient::join_room(&server.ws_url("nowhere"), "bob").await?;
    assert_eq!(
        client.next_message().await?,
        ServerMessage::Error("Room not found".to_string())
    );
    client.expect_closed().await?;

    Ok(())
}

#[tokio::test]
async fn test_first_message_must_be_join() -> Result<()> {
    let server = TestDiceServer::spawn().await?;
    let room = server.create_room("strict").await?;

    let mut client = TestRollerClient::connect(&server.ws_url(&room)).await?;
    client.roll(&[20]).await?;
    assert_eq!(
        client.next_message().await?,
        ServerMessage::Error("Invalid initial message".to_string())
    );
    client.expect_closed().await?;

    let state = server.registry().room_state(&room).await?;
    assert!(state.rollers.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_profile_update_is_uniquified_and_broadcast() -> Result<()> {
    let server = TestDiceServer::spawn().await?;
    let room = server.create_room("renames").await?;
    let url = server.ws_url(&room);

    let mut alice = TestRollerClient::join_room(&url, "alice").await?;
    assert_eq!(alice.next_message().await?, users("alice", &[]));

    let mut bob = TestRollerClient::join_room(&url, "bob").await?;
    assert_eq!(bob.next_message().await?, users("bob", &["alice"]));
    assert_eq!(alice.next_message().await?, users("alice", &["bob"]));

    bob.profile_update("alice").await?;
    assert_eq!(alice.next_message().await?, users("alice", &["alice-1"]));
    assert_eq!(bob.next_message().await?, users("alice-1", &["alice"]));

    // Rolls carry the new name
    bob.roll(&[4]).await?;
    assert_eq!(next_roll(&mut alice).await?.name, "alice-1");

    Ok(())
}

#[tokio::test]
async fn test_latecomer_receives_recent_rolls() -> Result<()> {
    let server = TestDiceServer::spawn_with_vars(HashMap::from([(
        "DICE_CACHED_RESULTS".to_string(),
        "2".to_string(),
    )]))
    .await?;
    let room = server.create_room("history").await?;
    let url = server.ws_url(&room);

    let mut alice = TestRollerClient::join_room(&url, "alice").await?;
    assert_eq!(alice.next_message().await?, users("alice", &[]));

    for dice in [[4u8], [8], [12]] {
        alice.roll(&dice).await?;
        next_roll(&mut alice).await?;
    }

    let mut carol = TestRollerClient::join_room(&url, "carol").await?;

    // Replayed rolls and the roster update travel on separate queues
    let mut replayed = Vec::new();
    let mut roster = None;
    for _ in 0..3 {
        match carol.next_message().await? {
            ServerMessage::Roll(results) => replayed.push(results),
            update @ ServerMessage::UsersUpdate(_) => roster = Some(update),
            other => anyhow::bail!("unexpected message {other:?}"),
        }
    }

    assert_eq!(roster, Some(users("carol", &["alice"])));
    let sizes: Vec<u8> = replayed
        .iter()
        .map(|r| r.results.first().map(|d| d.dice).unwrap())
        .collect();
    assert_eq!(sizes, vec![8, 12]);

    Ok(())
}

/// Poll the connection gauge; the server counts a socket on its own task.
async fn wait_for_connections(server: &TestDiceServer, expected: usize) -> Result<()> {
    for _ in 0..100 {
        if server.metrics().connection_count() == expected {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!(
        "expected {expected} connections, gauge reads {}",
        server.metrics().connection_count()
    )
}

#[tokio::test]
async fn test_oversized_message_gets_error_frame() -> Result<()> {
    let server = TestDiceServer::spawn().await?;
    let room = server.create_room("verbose").await?;

    let mut client = TestRollerClient::join_room(&server.ws_url(&room), "gina").await?;
    assert_eq!(client.next_message().await?, users("gina", &[]));

    client.profile_update(&"n".repeat(600)).await?;
    match client.next_message().await? {
        ServerMessage::Error(reason) => assert!(reason.starts_with("Invalid message")),
        other => anyhow::bail!("expected error, got {other:?}"),
    }
    client.expect_closed().await?;

    Ok(())
}

#[tokio::test]
async fn test_rejected_connections_are_counted() -> Result<()> {
    let server = TestDiceServer::spawn().await?;

    let mut client = TestRollerClient::connect(&server.ws_url("nowhere")).await?;
    wait_for_connections(&server, 1).await?;

    client.join("henry").await?;
    assert_eq!(
        client.next_message().await?,
        ServerMessage::Error("Room not found".to_string())
    );
    client.expect_closed().await?;
    wait_for_connections(&server, 0).await?;

    let room = server.create_room("counted").await?;
    let mut joined = TestRollerClient::join_room(&server.ws_url(&room), "ivy").await?;
    assert_eq!(joined.next_message().await?, users("ivy", &[]));
    assert_eq!(server.metrics().connection_count(), 1);

    joined.close().await?;
    wait_for_connections(&server, 0).await?;

    Ok(())
}

#[tokio::test]
async fn test_malformed_payload_closes_connection() -> Result<()> {
    let server = TestDiceServer::spawn().await?;
    let room = server.create_room("malformed").await?;
    let url = server.ws_url(&room);

    let mut watcher = TestRollerClient::join_room(&url, "watcher").await?;
    assert_eq!(watcher.next_message().await?, users("watcher", &[]));

    let mut client = TestRollerClient::join_room(&url, "mallory").await?;
    assert_eq!(client.next_message().await?, users("mallory", &["watcher"]));
    assert_eq!(watcher.next_message().await?, users("watcher", &["mallory"]));

    client.send_text(r#"{"type":"roll","payload":"d20"}"#).await?;
    match client.next_message().await? {
        ServerMessage::Error(reason) => assert!(reason.starts_with("Invalid message")),
        other => anyhow::bail!("expected error, got {other:?}"),
    }
    client.expect_closed().await?;

    // The room sees exactly one departure
    assert_eq!(watcher.next_message().await?, users("watcher", &[]));

    Ok(())
}

#[tokio::test]
async fn test_unknown_message_types_are_ignored() -> Result<()> {
    let server = TestDiceServer::spawn().await?;
    let room = server.create_room("chatty").await?;

    let mut client = TestRollerClient::join_room(&server.ws_url(&room), "dave").await?;
    assert_eq!(client.next_message().await?, users("dave", &[]));

    client
        .send_json(serde_json::json!({ "type": "chat", "payload": "hello" }))
        .await?;
    client.roll(&[10]).await?;

    let results = next_roll(&mut client).await?;
    assert_eq!(results.name, "dave");

    Ok(())
}

#[tokio::test]
async fn test_idle_room_is_removed() -> Result<()> {
    let server = TestDiceServer::spawn_with_vars(HashMap::from([(
        "DICE_ROOM_IDLE_SECONDS".to_string(),
        "1".to_string(),
    )]))
    .await?;
    let room = server.create_room("fleeting").await?;

    let mut client = TestRollerClient::join_room(&server.ws_url(&room), "erin").await?;
    assert_eq!(client.next_message().await?, users("erin", &[]));
    client.close().await?;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!server.registry().exists(&room).await);

    let mut late = TestRollerClient::join_room(&server.ws_url(&room), "frank").await?;
    assert_eq!(
        late.next_message().await?,
        ServerMessage::Error("Room not found".to_string())
    );

    Ok(())
}
