//! Empires RTS - Dedicated Server

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use empire_core::prelude::*;
use empire_server::game_loop::MatchLoop;
use empire_server::{network, ServerConfig};

fn config_from_env() -> ServerConfig {
    let mut config = ServerConfig::default();
    if let Some(port) = std::env::var("EMPIRE_PORT").ok().and_then(|v| v.parse().ok()) {
        config.port = port;
    }
    if let Some(players) = std::env::var("EMPIRE_PLAYERS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.player_count = players;
    }
    if let Some(seed) = std::env::var("EMPIRE_SEED").ok().and_then(|v| v.parse().ok()) {
        config.map_seed = seed;
    }
    config
}

fn load_game_data() -> GameData {
    let Ok(path) = std::env::var("EMPIRE_DATA_FILE") else {
        return GameData::standard();
    };
    match std::fs::read_to_string(&path).map_err(|e| e.to_string()).and_then(|text| {
        GameData::from_ron_str(&text).map_err(|e| e.to_string())
    }) {
        Ok(data) => {
            tracing::info!(%path, "loaded game data overrides");
            data
        }
        Err(error) => {
            tracing::warn!(%path, %error, "failed to load game data; using standard set");
            GameData::standard()
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = config_from_env();
    tracing::info!(
        port = config.port,
        players = config.player_count,
        "starting Empires dedicated server"
    );

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let connections = network::accept_players(&listener, config.player_count, events_tx).await?;

    let data = load_game_data();
    let map_config = MapConfig {
        seed: config.map_seed,
        ..MapConfig::default()
    };
    let game = match Game::new_generated(data, &map_config, config.player_count) {
        Ok(game) => game,
        Err(error) => {
            tracing::error!(%error, "failed to create match");
            return Ok(());
        }
    };

    let mut match_loop = MatchLoop::new(game, config, connections, events_rx);
    match_loop.wait_for_loading().await;
    match_loop.run().await;

    tracing::info!("match ended; shutting down");
    Ok(())
}
