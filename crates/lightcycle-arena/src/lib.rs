//! Light-cycle arenas for lightcycle.
//!
//! An arena is one match on a toroidal board. It borrows the players'
//! sessions from the [`SessionRegistry`](lightcycle_session::SessionRegistry)
//! on every call instead of owning them, so a session survives the arena
//! and can join the next one.
//!
//! # Key types
//!
//! - [`Arena`]: board, participants and the tick rules
//! - [`MatchOutcome`]: winners and losers handed back when a match ends
//! - [`ArenaSnapshot`]: serializable view for spectators
//! - [`multi_elo`]: rating update applied at the end of a match

mod arena;
mod config;
mod error;
mod grid;
mod rating;
mod snapshot;

pub use arena::{Arena, MatchOutcome, DEFAULT_DIRECTION};
pub use config::{ArenaConfig, ArenaState};
pub use error::ArenaError;
pub use grid::{wrap_step, Cell, Grid};
pub use rating::{competition_places, multi_elo, RatingConfig};
pub use snapshot::{ArenaSnapshot, PlayerSnapshot, Position};
