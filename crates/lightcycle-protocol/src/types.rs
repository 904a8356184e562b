//! Identity types, directions and wire error codes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's index inside one arena.
///
/// Not stable across matches: the same session gets a fresh id every time
/// it is spawned into a new arena. Serializes as the bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl PlayerId {
    /// Position of this player in the arena's participant list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for one arena (one match).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArenaId(pub u64);

impl fmt::Display for ArenaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// A movement direction. `Up` decreases `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// All directions in protocol order.
    pub const ALL: [Direction; 4] = [Self::Up, Self::Right, Self::Down, Self::Left];

    /// The wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Right => "right",
            Self::Down => "down",
            Self::Left => "left",
        }
    }

    /// Unit step `(dx, dy)`.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Self::Up => (0, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
        }
    }
}

impl FromStr for Direction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownDirection(s.to_string()))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Stable codes carried by the `error` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // -- resource limits (always followed by a disconnect) --
    PacketOverflow,
    JoinTimeout,
    Afk,
    Spam,
    MaxConnections,

    // -- handshake (always followed by a disconnect) --
    JoinExpected,
    InvalidUsername,
    UsernameTooShort,
    UsernameTooLong,
    UsernameInvalidSymbols,
    InvalidPassword,
    PasswordTooShort,
    PasswordTooLong,
    ReservedUsername,
    WrongPassword,
    SessionTakenOver,

    // -- warnings after join (connection stays open) --
    UnknownPacket,
    UnknownMove,
    InvalidChat,
    ChatNotAlive,
}

impl ErrorCode {
    /// The wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PacketOverflow => "ERROR_PACKET_OVERFLOW",
            Self::JoinTimeout => "ERROR_JOIN_TIMEOUT",
            Self::Afk => "ERROR_AFK",
            Self::Spam => "ERROR_SPAM",
            Self::MaxConnections => "ERROR_MAX_CONNECTIONS",
            Self::JoinExpected => "ERROR_JOIN_EXPECTED",
            Self::InvalidUsername => "ERROR_INVALID_USERNAME",
            Self::UsernameTooShort => "ERROR_USERNAME_TOO_SHORT",
            Self::UsernameTooLong => "ERROR_USERNAME_TOO_LONG",
            Self::UsernameInvalidSymbols => "ERROR_USERNAME_INVALID_SYMBOLS",
            Self::InvalidPassword => "ERROR_INVALID_PASSWORD",
            Self::PasswordTooShort => "ERROR_PASSWORD_TOO_SHORT",
            Self::PasswordTooLong => "ERROR_PASSWORD_TOO_LONG",
            Self::ReservedUsername => "ERROR_RESERVED_USERNAME",
            Self::WrongPassword => "ERROR_WRONG_PASSWORD",
            Self::SessionTakenOver => "ERROR_SESSION_TAKEN_OVER",
            Self::UnknownPacket => "ERROR_UNKNOWN_PACKET",
            Self::UnknownMove => "ERROR_UNKNOWN_MOVE",
            Self::InvalidChat => "ERROR_INVALID_CHAT",
            Self::ChatNotAlive => "ERROR_CHAT_NOT_ALIVE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
