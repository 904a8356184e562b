//! A player's persistent identity and in-match state.
//!
//! A [`PlayerSession`] outlives connections and arenas: it is created the
//! first time a username joins and lives for the rest of the process. A
//! connection is *bound* to it after a successful join; inbound packets
//! from that connection are fed to [`PlayerSession::handle_packet`].
//!
//! ```text
//!   join ──→ bind_connection ──→ handle_packet* ──→ connection_lost
//!                 ↑                                       │
//!                 └──────────── next join ────────────────┘
//! ```
//!
//! The arena reads intent only through
//! [`read_and_reset_action`](PlayerSession::read_and_reset_action), once
//! per tick, so any number of `move` packets within a tick collapse to the
//! last one.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lightcycle_protocol::{is_valid_text, ClientPacket, Direction, ErrorCode, ServerPacket};
use lightcycle_transport::{ConnectionHandle, ConnectionId};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::store::{Outcome, PlayerRecord, ScoreEntry, INITIAL_RATING};

/// Score entries older than this are ignored and pruned.
pub const SCORE_WINDOW: Duration = Duration::from_secs(2 * 60 * 60);

/// How long a chat message stays visible.
pub const CHAT_TTL: Duration = Duration::from_secs(5);

/// Milliseconds since the Unix epoch, the timestamp unit of score entries.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Something the owner of the session has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The player said something; relay it to the arena.
    Chat(String),
}

/// Wins and losses within the score window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreStats {
    pub wins: usize,
    pub loses: usize,
}

impl ScoreStats {
    /// Share of games won, `0.0` with no games.
    pub fn win_ratio(self) -> f64 {
        let games = self.wins + self.loses;
        if games == 0 {
            0.0
        } else {
            self.wins as f64 / games as f64
        }
    }
}

#[derive(Debug, Clone)]
struct Chat {
    text: String,
    expires_at: Instant,
}

/// A player known to the server.
#[derive(Debug)]
pub struct PlayerSession {
    username: String,
    password: String,
    rating: f64,
    score_history: Vec<ScoreEntry>,
    chat: Option<Chat>,
    action: Option<Direction>,
    pos: (u32, u32),
    trail: Vec<(u32, u32)>,
    alive: bool,
    connection: Option<ConnectionHandle>,
}

impl PlayerSession {
    /// A brand-new player with the initial rating and no history.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            rating: INITIAL_RATING,
            score_history: Vec::new(),
            chat: None,
            action: None,
            pos: (0, 0),
            trail: Vec::new(),
            alive: false,
            connection: None,
        }
    }

    /// Restores a player from storage.
    pub fn from_record(username: impl Into<String>, record: PlayerRecord) -> Self {
        let mut session = Self::new(username, record.password);
        session.rating = record.rating;
        session.score_history = record.score_history;
        session
    }

    /// The persisted part of this session, history pruned.
    pub fn to_record(&mut self) -> PlayerRecord {
        PlayerRecord {
            password: self.password.clone(),
            score_history: self.score_history().to_vec(),
            rating: self.rating,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Plain comparison with the stored password.
    pub fn password_matches(&self, password: &str) -> bool {
        self.password == password
    }

    pub fn rating(&self) -> f64 {
        self.rating
    }

    pub fn set_rating(&mut self, rating: f64) {
        self.rating = rating;
    }

    // -- connection binding ----------------------------------------------

    /// Binds `conn`, evicting any other live connection with
    /// `ERROR_SESSION_TAKEN_OVER`. Returns `true` if one was evicted.
    pub fn bind_connection(&mut self, conn: ConnectionHandle) -> bool {
        let mut evicted = false;
        if let Some(old) = self.connection.take() {
            if old.id() != conn.id() && old.is_connected() {
                info!(username = %self.username, old = %old.id(), new = %conn.id(), "session taken over");
                old.send_error(ErrorCode::SessionTakenOver, true);
                evicted = true;
            }
        }
        conn.mark_joined();
        self.connection = Some(conn);
        evicted
    }

    /// Forgets connection `id` if it is the bound one, along with the
    /// pending action and chat. Returns `false` for a stale id.
    pub fn connection_lost(&mut self, id: ConnectionId) -> bool {
        if self.connection_id() != Some(id) {
            return false;
        }
        debug!(username = %self.username, conn_id = %id, "connection lost");
        self.connection = None;
        self.action = None;
        self.chat = None;
        true
    }

    /// Whether a live connection is bound.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(ConnectionHandle::is_connected)
    }

    /// Whether connection `id` is the bound one and still live.
    pub fn is_bound_to(&self, id: ConnectionId) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.id() == id && c.is_connected())
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(ConnectionHandle::id)
    }

    pub fn connection(&self) -> Option<&ConnectionHandle> {
        self.connection.as_ref()
    }

    pub fn send(&self, packet: &ServerPacket) {
        if let Some(conn) = &self.connection {
            conn.send(packet);
        }
    }

    pub fn raw_send(&self, bytes: &[u8]) {
        if let Some(conn) = &self.connection {
            conn.raw_send(bytes);
        }
    }

    fn warn(&self, code: ErrorCode) {
        if let Some(conn) = &self.connection {
            conn.send_error(code, false);
        }
    }

    // -- inbound packets ---------------------------------------------------

    /// Applies one packet from the bound connection.
    ///
    /// Problems are reported to the client as `error` packets; the
    /// connection stays open.
    pub fn handle_packet(&mut self, packet: ClientPacket) -> Option<SessionEvent> {
        match packet {
            ClientPacket::Move(Some(direction)) => {
                self.action = Some(direction);
                None
            }
            ClientPacket::Move(None) => {
                self.warn(ErrorCode::UnknownMove);
                None
            }
            ClientPacket::Chat(text) => {
                if !self.alive {
                    self.warn(ErrorCode::ChatNotAlive);
                    return None;
                }
                if !is_valid_text(&text, 1) {
                    self.warn(ErrorCode::InvalidChat);
                    return None;
                }
                self.chat = Some(Chat {
                    text: text.clone(),
                    expires_at: Instant::now() + CHAT_TTL,
                });
                Some(SessionEvent::Chat(text))
            }
            ClientPacket::Join { .. } | ClientPacket::Unknown(_) => {
                self.warn(ErrorCode::UnknownPacket);
                None
            }
        }
    }

    /// The current chat message, if it has not expired.
    pub fn chat(&self) -> Option<&str> {
        self.chat
            .as_ref()
            .filter(|c| Instant::now() < c.expires_at)
            .map(|c| c.text.as_str())
    }

    /// Returns the pending move and clears it.
    pub fn read_and_reset_action(&mut self) -> Option<Direction> {
        self.action.take()
    }

    // -- arena state -------------------------------------------------------

    /// Places the player at a fresh spawn cell, alive, with no pending move
    /// and no chat.
    pub fn spawn(&mut self, x: u32, y: u32) {
        self.pos = (x, y);
        self.trail.clear();
        self.trail.push((x, y));
        self.action = None;
        self.chat = None;
        self.alive = true;
    }

    /// Moves the head to `(x, y)`, extending the trail.
    pub fn apply_move(&mut self, x: u32, y: u32) {
        self.pos = (x, y);
        self.trail.push((x, y));
    }

    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    /// Empties the trail, returning the cells it covered.
    pub fn take_trail(&mut self) -> Vec<(u32, u32)> {
        std::mem::take(&mut self.trail)
    }

    pub fn pos(&self) -> (u32, u32) {
        self.pos
    }

    pub fn trail(&self) -> &[(u32, u32)] {
        &self.trail
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    // -- score -------------------------------------------------------------

    /// Appends a match result, then tells the client its updated totals.
    /// A loss also marks the player dead.
    pub fn record_outcome(&mut self, outcome: Outcome) {
        self.score_history.push(ScoreEntry {
            outcome,
            time: unix_millis(),
        });
        if outcome == Outcome::Lose {
            self.alive = false;
        }
        let ScoreStats { wins, loses } = self.stats();
        self.send(&match outcome {
            Outcome::Win => ServerPacket::Win { wins, loses },
            Outcome::Lose => ServerPacket::Lose { wins, loses },
        });
    }

    /// Score entries within the window, pruning older ones.
    pub fn score_history(&mut self) -> &[ScoreEntry] {
        self.score_history_at(unix_millis())
    }

    /// [`score_history`](Self::score_history) as of `now_ms`.
    pub fn score_history_at(&mut self, now_ms: u64) -> &[ScoreEntry] {
        let window = SCORE_WINDOW.as_millis() as u64;
        self.score_history
            .retain(|entry| now_ms.saturating_sub(entry.time) <= window);
        &self.score_history
    }

    /// Wins and losses within the window.
    pub fn stats(&mut self) -> ScoreStats {
        count(self.score_history())
    }

    pub fn wins(&mut self) -> usize {
        self.stats().wins
    }

    pub fn loses(&mut self) -> usize {
        self.stats().loses
    }

    pub fn win_ratio(&mut self) -> f64 {
        self.stats().win_ratio()
    }
}

/// Tallies wins and losses of a history slice.
pub fn count(history: &[ScoreEntry]) -> ScoreStats {
    history.iter().fold(ScoreStats::default(), |mut stats, entry| {
        match entry.outcome {
            Outcome::Win => stats.wins += 1,
            Outcome::Lose => stats.loses += 1,
        }
        stats
    })
}
