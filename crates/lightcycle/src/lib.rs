//! # lightcycle
//!
//! A tick-synchronized light-cycle game server.
//!
//! Clients connect over TCP, speak a line-based `|`-separated protocol,
//! `join` with a username and password, and steer once per tick. Running
//! into any trail, or into the same cell as another player, is fatal; the
//! last player standing wins and ratings are updated.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lightcycle::prelude::*;
//!
//! # async fn start() -> Result<(), LightcycleError> {
//! let server = GameServerBuilder::new()
//!     .bind("0.0.0.0:4000")
//!     .build(JsonFileStore::new("data.json"))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod matchmaker;
mod scoreboard;
mod server;

pub use config::{LateJoinPolicy, ServerConfig, DEFAULT_MOTD};
pub use error::{ConfigSource, LightcycleError};
pub use matchmaker::{Matchmaker, ServerSnapshot, Timer};
pub use scoreboard::{ChartPoint, ScoreboardEntry, Standings, CHART_POINTS, SCOREBOARD_SIZE};
pub use server::{GameServer, GameServerBuilder, DEFAULT_PORT};

/// Everything needed to embed a server.
pub mod prelude {
    pub use crate::{
        GameServer, GameServerBuilder, LateJoinPolicy, LightcycleError, ServerConfig,
        ServerSnapshot,
    };
    pub use lightcycle_arena::ArenaSnapshot;
    pub use lightcycle_session::{JsonFileStore, MemoryStore, PlayerStore};
}
