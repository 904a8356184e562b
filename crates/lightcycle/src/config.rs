//! Server configuration.

use std::path::Path;
use std::time::Duration;

use lightcycle_arena::{ArenaConfig, RatingConfig};
use lightcycle_tick::{TickConfig, TickRamp};
use lightcycle_transport::ConnectionLimits;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigSource, LightcycleError};

pub const DEFAULT_MOTD: &str =
    "Welcome to lightcycle! Join with a username and password, then send one move per tick.";

// ---------------------------------------------------------------------------
// LateJoinPolicy
// ---------------------------------------------------------------------------

/// What happens to a player who joins while a match is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateJoinPolicy {
    /// Sit out until the next match starts.
    #[default]
    WaitForNextMatch,
    /// Spawn into the running match on the next free diagonal cell.
    JoinRunning,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Everything tunable about a game server.
///
/// Every field has a default, so a JSON config file only needs the keys it
/// changes. Durations are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Sent to every client right after it connects.
    pub motd: String,

    /// Simultaneous connections allowed from one IP address.
    pub max_connections_per_ip: usize,

    /// Time a new connection has to send a valid `join`.
    pub join_timeout_ms: u64,

    /// Disconnect after this long without inbound data. `None` disables it.
    pub idle_timeout_ms: Option<u64>,

    /// Per-connection packet cap over a sliding second. `None` disables it.
    pub max_packets_per_second: Option<u32>,

    pub late_join: LateJoinPolicy,

    /// Pause between the end of a match and the start of the next.
    pub match_cooldown_ms: u64,

    /// Retry interval while nobody is connected.
    pub match_retry_delay_ms: u64,

    /// Tick rate at the start of each match.
    pub base_tick_rate_hz: u32,

    /// The tick rate grows by one every interval. `0` keeps it constant.
    pub tick_ramp_interval_ms: u64,

    pub max_tick_rate_hz: u32,

    /// Random delay, in microseconds, before the first tick of a match.
    /// Keeps matches on several servers from ticking in lockstep.
    pub first_tick_jitter_us: u64,

    /// Elo K-factor.
    pub rating_k: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            motd: DEFAULT_MOTD.to_string(),
            max_connections_per_ip: 1,
            join_timeout_ms: 5_000,
            idle_timeout_ms: None,
            max_packets_per_second: None,
            late_join: LateJoinPolicy::default(),
            match_cooldown_ms: 100,
            match_retry_delay_ms: 1_000,
            base_tick_rate_hz: 1,
            tick_ramp_interval_ms: 20_000,
            max_tick_rate_hz: TickConfig::MAX_TICK_RATE_HZ,
            first_tick_jitter_us: 0,
            rating_k: 32.0,
        }
    }
}

impl ServerConfig {
    /// Parses a JSON config. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads a JSON config file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LightcycleError> {
        let path = path.as_ref();
        let config_error = |source: ConfigSource| LightcycleError::Config {
            path: path.display().to_string(),
            source,
        };
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| config_error(e.into()))?;
        Self::from_json(&json).map_err(|e| config_error(e.into()))
    }

    /// Limits handed to every accepted connection.
    pub fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            join_timeout: Duration::from_millis(self.join_timeout_ms),
            idle_timeout: self.idle_timeout_ms.map(Duration::from_millis),
            max_packets_per_second: self.max_packets_per_second,
            ..ConnectionLimits::default()
        }
    }

    /// Schedule for the ticks of one match.
    pub fn tick_config(&self) -> TickConfig {
        let ramp = (self.tick_ramp_interval_ms > 0).then(|| TickRamp {
            interval: Duration::from_millis(self.tick_ramp_interval_ms),
            max_rate_hz: self.max_tick_rate_hz,
        });
        TickConfig {
            ramp,
            initial_jitter_us: self.first_tick_jitter_us,
            ..TickConfig::with_rate(self.base_tick_rate_hz)
        }
        .validated()
    }

    pub fn arena_config(&self) -> ArenaConfig {
        ArenaConfig {
            rating: RatingConfig {
                k: self.rating_k,
                ..RatingConfig::default()
            },
        }
    }

    pub fn match_cooldown(&self) -> Duration {
        Duration::from_millis(self.match_cooldown_ms)
    }

    pub fn match_retry_delay(&self) -> Duration {
        Duration::from_millis(self.match_retry_delay_ms)
    }
}
