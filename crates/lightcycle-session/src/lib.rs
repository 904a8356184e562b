//! Player sessions for lightcycle.
//!
//! This crate owns everything that outlives a single connection:
//!
//! 1. **Identity**: [`Credentials`] validates a `join`, [`PlayerSession`]
//!    holds password, rating and score history
//! 2. **Live state**: the bound connection, pending move, chat, and the
//!    position/trail the arena writes
//! 3. **Persistence**: the [`PlayerStore`] trait with a JSON file and an
//!    in-memory implementation
//!
//! # How it fits in the stack
//!
//! ```text
//! Arena / Matchmaker (above)  ← read actions, write positions and outcomes
//!     ↕
//! Session Layer (this crate)  ← identity, connection binding, chat, score
//!     ↕
//! Transport / Protocol (below)  ← ConnectionHandle, ClientPacket
//! ```

#![allow(async_fn_in_trait)]

mod credentials;
mod error;
mod registry;
mod session;
mod store;

pub use credentials::{Credentials, MAX_PASSWORD_LEN, MAX_USERNAME_LEN, RESERVED_USERNAME};
pub use error::{SessionError, StoreError};
pub use registry::SessionRegistry;
pub use session::{
    count, unix_millis, PlayerSession, ScoreStats, SessionEvent, CHAT_TTL, SCORE_WINDOW,
};
pub use store::{
    JsonFileStore, MemoryStore, Outcome, PlayerRecord, PlayerRecords, PlayerStore, ScoreEntry,
    INITIAL_RATING,
};
