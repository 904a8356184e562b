//! The lightcycle game server binary.
//!
//! Environment:
//! - `GAME_PORT`: TCP port (default 4000)
//! - `DATA_PATH`: player data file (default `data.json` in the temp dir)
//! - `LIGHTCYCLE_CONFIG`: optional JSON [`ServerConfig`] file
//! - `RUST_LOG`: log filter (default `info`)

use std::path::PathBuf;

use lightcycle::prelude::*;
use lightcycle::DEFAULT_PORT;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), LightcycleError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = match std::env::var("GAME_PORT") {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(%raw, "GAME_PORT is not a port number, using default");
            DEFAULT_PORT
        }),
        Err(_) => DEFAULT_PORT,
    };
    let data_path = std::env::var_os("DATA_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("data.json"));
    let config = match std::env::var_os("LIGHTCYCLE_CONFIG") {
        Some(path) => ServerConfig::load(path).await?,
        None => ServerConfig::default(),
    };
    info!(port, data_path = %data_path.display(), "starting");

    let server = GameServerBuilder::new()
        .bind(format!("0.0.0.0:{port}"))
        .config(config)
        .build(JsonFileStore::new(data_path))
        .await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
