//! Notification listener example
//!
//! Connects to a Kodi instance, prints what is playing and then logs
//! player and library notifications until Ctrl-C.
//!
//! Run with: cargo run --example notification_listener -- <host> [user] [password]

use kodirpc::events::{ApplicationOnVolumeChanged, PlayerOnPlay, PlayerOnStop, VideoLibraryOnUpdate};
use kodirpc::{ClientBuilder, ConnectionSettings, ObservabilityConfig};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct ActivePlayer {
    playerid: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());

    let mut settings = ConnectionSettings::new(host);
    if let (Some(user), Some(password)) = (args.next(), args.next()) {
        settings = settings.credentials(user, password);
    }

    let client = ClientBuilder::new(settings)
        .with_observability(
            ObservabilityConfig::new("kodirpc-listener")
                .with_json_output(false)
                .with_log_level("info,kodirpc_client=debug"),
        )
        .build()?;

    let pong: String = client.call("JSONRPC.Ping", ()).await?;
    println!("Kodi answered {}", pong);

    let players: Vec<ActivePlayer> = client.call("Player.GetActivePlayers", ()).await?;
    for player in &players {
        let item: serde_json::Value = client
            .call(
                "Player.GetItem",
                json!({"playerid": player.playerid, "properties": ["title"]}),
            )
            .await?;
        println!("{} player {}: {}", player.kind, player.playerid, item["item"]["label"]);
    }

    client.on::<PlayerOnPlay, _>(|_, data| {
        if let Some(play) = data {
            tracing::info!(playerid = play.player.playerid, item = ?play.item, "Playback started");
        }
    });
    client.on::<PlayerOnStop, _>(|_, data| {
        let ended = data.map(|stop| stop.end).unwrap_or(false);
        tracing::info!(ended, "Playback stopped");
    });
    client.on::<ApplicationOnVolumeChanged, _>(|_, data| {
        if let Some(volume) = data {
            tracing::info!(volume = volume.volume, muted = volume.muted, "Volume changed");
        }
    });
    client.on::<VideoLibraryOnUpdate, _>(|_, data| {
        if let Some(update) = data {
            tracing::info!(id = update.id, kind = %update.kind, "Library item updated");
        }
    });
    client.on_notification("System.OnQuit", |sender, _| {
        tracing::warn!(sender, "Kodi is shutting down");
    });

    client.start_notification_listener().await?;
    println!("Listening for notifications, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    client.dispose().await;
    kodirpc::core::shutdown_observability();

    Ok(())
}
