//! Typed packet schema on top of the raw codec.
//!
//! Every tag the server understands maps to one variant with typed
//! arguments. Anything else becomes [`ClientPacket::Unknown`] so callers
//! can match exhaustively.

use crate::codec::{self, Field, RawPacket};
use crate::{Direction, ErrorCode, PlayerId};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A packet sent by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    /// `join|<username>|<password>`. Fields are kept raw because the
    /// handshake rejects numeric usernames with a dedicated error code.
    Join {
        username: Option<Field>,
        password: Option<Field>,
    },

    /// `move|<direction>`. `None` when the direction is not recognized.
    Move(Option<Direction>),

    /// `chat|<text>`. Empty when no text was given.
    Chat(String),

    /// Any other tag, including the empty tag of a blank line.
    Unknown(String),
}

impl ClientPacket {
    /// Matches a raw packet against the client schema.
    pub fn from_raw(raw: RawPacket) -> Self {
        match raw.tag() {
            "join" => Self::Join {
                username: raw.arg(0).cloned(),
                password: raw.arg(1).cloned(),
            },
            "move" => Self::Move(raw.arg(0).and_then(|f| f.as_str().parse().ok())),
            "chat" => Self::Chat(raw.arg(0).map(|f| f.as_str().to_string()).unwrap_or_default()),
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The tag this packet was sent with.
    pub fn tag(&self) -> &str {
        match self {
            Self::Join { .. } => "join",
            Self::Move(_) => "move",
            Self::Chat(_) => "chat",
            Self::Unknown(tag) => tag,
        }
    }
}

impl From<RawPacket> for ClientPacket {
    fn from(raw: RawPacket) -> Self {
        Self::from_raw(raw)
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// A packet sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    /// Greeting sent on connect.
    Motd(String),
    /// Error or warning code.
    Error(ErrorCode),
    /// A new arena started: board size and the receiver's own id.
    Game {
        width: u32,
        height: u32,
        player_id: PlayerId,
    },
    /// Current head position of a player.
    Pos { player_id: PlayerId, x: u32, y: u32 },
    /// Players that died this tick.
    Die(Vec<PlayerId>),
    /// End of a tick's batch.
    Tick,
    /// The receiver won; totals within the score window.
    Win { wins: usize, loses: usize },
    /// The receiver lost; totals within the score window.
    Lose { wins: usize, loses: usize },
    /// Chat relay.
    Message { player_id: PlayerId, text: String },
}

impl ServerPacket {
    /// The wire tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Motd(_) => "motd",
            Self::Error(_) => "error",
            Self::Game { .. } => "game",
            Self::Pos { .. } => "pos",
            Self::Die(_) => "die",
            Self::Tick => "tick",
            Self::Win { .. } => "win",
            Self::Lose { .. } => "lose",
            Self::Message { .. } => "message",
        }
    }

    /// Renders the packet as an ordered field list, tag first.
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::text(self.tag())];
        match self {
            Self::Motd(text) => fields.push(Field::text(text.as_str())),
            Self::Error(code) => fields.push(Field::text(code.as_str())),
            Self::Game {
                width,
                height,
                player_id,
            } => fields.extend([(*width).into(), (*height).into(), player_id.0.into()]),
            Self::Pos { player_id, x, y } => {
                fields.extend([player_id.0.into(), (*x).into(), (*y).into()])
            }
            Self::Die(ids) => fields.extend(ids.iter().map(|id| Field::from(id.0))),
            Self::Tick => {}
            Self::Win { wins, loses } | Self::Lose { wins, loses } => {
                fields.extend([(*wins).into(), (*loses).into()])
            }
            Self::Message { player_id, text } => {
                fields.extend([player_id.0.into(), Field::text(text.as_str())])
            }
        }
        fields
    }

    /// Encodes the packet as one line.
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(&self.fields())
    }

    /// Appends the encoded packet to a batch buffer.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        codec::encode_into(out, &self.fields());
    }
}
