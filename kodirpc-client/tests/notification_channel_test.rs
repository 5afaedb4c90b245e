//! Notification channel integration tests
//!
//! A mock TCP endpoint writes notification bytes in arbitrary chunks and the
//! client is expected to reassemble and route them.

mod common;

use common::{notification, player_on_play, recv_within, MockNotificationServer};
use kodirpc_client::events::{InputOnInputRequested, PlayerOnPlay};
use kodirpc_client::{ChannelState, ConnectionSettings, KodiClient};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

fn client_for(server: &MockNotificationServer) -> KodiClient {
    KodiClient::new(ConnectionSettings::new("127.0.0.1").tcp_port(server.port())).unwrap()
}

/// Forward every notification's method name to a channel
fn record_methods(client: &KodiClient, methods: &[&str]) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    for name in methods {
        let tx = tx.clone();
        let name = name.to_string();
        client.on_notification(name.clone(), move |_, _| {
            let _ = tx.send(name.clone());
        });
    }
    rx
}

async fn wait_for_state(client: &KodiClient, expected: ChannelState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while client.notification_state().await != Some(expected) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("listener did not reach expected state");
}

#[tokio::test]
async fn test_message_split_across_writes() {
    let mut server = MockNotificationServer::start().await;
    let client = client_for(&server);

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on::<PlayerOnPlay, _>(move |sender, data| {
        let _ = tx.send((sender.to_string(), data.map(|d| d.player.playerid)));
    });

    client.start_notification_listener().await.unwrap();
    server.wait_for_client().await;
    assert_eq!(client.notification_state().await, Some(ChannelState::Listening));

    let wire = player_on_play(1);
    let bytes = wire.as_bytes();
    server
        .write_chunks(&[&bytes[..10], &bytes[10..57], &bytes[57..]])
        .await;

    let (sender, playerid) = recv_within(&mut rx).await;
    assert_eq!(sender, "xbmc");
    assert_eq!(playerid, Some(1));

    client.dispose().await;
}

#[tokio::test]
async fn test_coalesced_messages_arrive_in_order() {
    let mut server = MockNotificationServer::start().await;
    let client = client_for(&server);
    let mut rx = record_methods(&client, &["Player.OnPlay", "Player.OnPause", "Player.OnStop"]);

    client.start_notification_listener().await.unwrap();
    server.wait_for_client().await;

    let batch = format!(
        "{}{}{}",
        player_on_play(1),
        notification("Player.OnPause", json!({"player": {"playerid": 1, "speed": 0}})),
        notification("Player.OnStop", json!({"item": {"type": "episode"}, "end": false})),
    );
    server.write(batch);

    assert_eq!(recv_within(&mut rx).await, "Player.OnPlay");
    assert_eq!(recv_within(&mut rx).await, "Player.OnPause");
    assert_eq!(recv_within(&mut rx).await, "Player.OnStop");

    client.dispose().await;
}

#[tokio::test]
async fn test_garbage_is_skipped() {
    let mut server = MockNotificationServer::start().await;
    let client = client_for(&server);
    let mut rx = record_methods(&client, &["Player.OnPlay", "System.OnWake"]);

    client.start_notification_listener().await.unwrap();
    server.wait_for_client().await;

    let wake = notification("System.OnWake", json!(null));
    server
        .write_chunks(&[
            player_on_play(1).as_bytes(),
            b"\x00garbage",
            wake.as_bytes(),
        ])
        .await;

    assert_eq!(recv_within(&mut rx).await, "Player.OnPlay");
    assert_eq!(recv_within(&mut rx).await, "System.OnWake");
    assert_eq!(client.notification_state().await, Some(ChannelState::Listening));

    client.dispose().await;
}

#[tokio::test]
async fn test_unsubscribed_notifications_are_ignored() {
    let mut server = MockNotificationServer::start().await;
    let client = client_for(&server);
    let mut rx = record_methods(&client, &["Player.OnPlay"]);

    client.start_notification_listener().await.unwrap();
    server.wait_for_client().await;

    server.write(notification("VideoLibrary.OnScanStarted", json!(null)));
    server.write(notification("Custom.Addon.Event", json!({"x": 1})));
    server.write(player_on_play(2));

    assert_eq!(recv_within(&mut rx).await, "Player.OnPlay");
    assert!(rx.try_recv().is_err());

    client.dispose().await;
}

#[tokio::test]
async fn test_multibyte_text_split_mid_character() {
    let mut server = MockNotificationServer::start().await;
    let client = client_for(&server);

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on::<InputOnInputRequested, _>(move |_, data| {
        let _ = tx.send(data.map(|d| d.title));
    });

    client.start_notification_listener().await.unwrap();
    server.wait_for_client().await;

    let wire = notification(
        "Input.OnInputRequested",
        json!({"title": "Suche: Bücher über Käse", "type": "keyboard", "value": ""}),
    );
    let bytes = wire.as_bytes();
    let split = wire.find('ü').unwrap() + 1;
    server.write_chunks(&[&bytes[..split], &bytes[split..]]).await;

    assert_eq!(
        recv_within(&mut rx).await,
        Some("Suche: Bücher über Käse".to_string())
    );

    client.dispose().await;
}

#[tokio::test]
async fn test_bad_payload_does_not_block_other_handlers() {
    let mut server = MockNotificationServer::start().await;
    let client = client_for(&server);

    let (typed_tx, mut typed_rx) = mpsc::unbounded_channel();
    client.on::<PlayerOnPlay, _>(move |_, data| {
        let _ = typed_tx.send(data.is_some());
    });
    let mut raw_rx = record_methods(&client, &["Player.OnPlay"]);

    client.start_notification_listener().await.unwrap();
    server.wait_for_client().await;

    server.write(notification("Player.OnPlay", json!({"player": "not an object"})));
    assert_eq!(recv_within(&mut raw_rx).await, "Player.OnPlay");
    assert!(typed_rx.try_recv().is_err());

    // The channel is still healthy
    server.write(player_on_play(1));
    assert_eq!(recv_within(&mut raw_rx).await, "Player.OnPlay");
    assert!(recv_within(&mut typed_rx).await);

    client.dispose().await;
}

#[tokio::test]
async fn test_dispose_releases_connection() {
    let mut server = MockNotificationServer::start().await;
    let client = client_for(&server);
    let mut rx = record_methods(&client, &["Player.OnPlay"]);

    client.start_notification_listener().await.unwrap();
    server.wait_for_client().await;

    client.dispose().await;
    assert_eq!(client.notification_state().await, Some(ChannelState::Closed));
    server.wait_for_client_close().await;

    // Disposing twice is harmless
    client.dispose().await;

    server.write(player_on_play(1));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_server_close_then_restart() {
    let mut server = MockNotificationServer::start().await;
    let client = client_for(&server);
    let mut rx = record_methods(&client, &["Player.OnPlay"]);

    client.start_notification_listener().await.unwrap();
    server.wait_for_client().await;

    server.close_connection();
    wait_for_state(&client, ChannelState::Closed).await;

    // A closed listener is replaced by a fresh one
    client.start_notification_listener().await.unwrap();
    server.wait_for_client().await;
    server.write(player_on_play(3));
    assert_eq!(recv_within(&mut rx).await, "Player.OnPlay");

    client.dispose().await;
}

#[tokio::test]
async fn test_second_start_while_listening_is_rejected() {
    let mut server = MockNotificationServer::start().await;
    let client = client_for(&server);

    client.start_notification_listener().await.unwrap();
    server.wait_for_client().await;

    let err = client.start_notification_listener().await.unwrap_err();
    assert!(matches!(err, kodirpc_core::Error::InvalidState(_)));
    assert_eq!(client.notification_state().await, Some(ChannelState::Listening));

    client.dispose().await;
}

#[tokio::test]
async fn test_connect_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let client = KodiClient::new(ConnectionSettings::new("127.0.0.1").tcp_port(port)).unwrap();
    let err = client.start_notification_listener().await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(client.notification_state().await, Some(ChannelState::Closed));
}
