//! Error types for the arena layer.

use lightcycle_protocol::ArenaId;

/// Errors from arena operations.
///
/// All of these are engine invariant errors: the matchmaker logs them and
/// carries on.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// No participant could be spawned.
    #[error("no connected players to start an arena with")]
    NoParticipants,

    /// The session is already a participant.
    #[error("{0:?} already plays in arena {1}")]
    AlreadyJoined(String, ArenaId),

    /// No free spawn cell is left.
    #[error("arena {0} is full")]
    Full(ArenaId),

    /// The username does not belong to a connected session.
    #[error("no connected session for {0:?}")]
    UnknownSession(String),

    /// The username is not a participant.
    #[error("{0:?} does not play in arena {1}")]
    NotParticipant(String, ArenaId),

    /// The arena has already ended.
    #[error("arena {0} has ended")]
    Ended(ArenaId),
}
