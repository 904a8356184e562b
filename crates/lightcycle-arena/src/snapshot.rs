//! Read-only view of a running arena for spectators.

use lightcycle_protocol::{ArenaId, PlayerId};
use serde::Serialize;

/// A board position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl From<(u32, u32)> for Position {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

/// One participant as spectators see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub alive: bool,
    pub name: String,
    pub pos: Position,
    /// Trail cells, oldest first.
    pub moves: Vec<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<String>,
}

/// The whole arena at one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArenaSnapshot {
    pub id: ArenaId,
    pub width: u32,
    pub height: u32,
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
}
