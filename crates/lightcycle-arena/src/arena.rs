//! One light-cycle match.
//!
//! An [`Arena`] is plain data driven from outside: the matchmaker calls
//! [`Arena::tick`] whenever its scheduler fires, and every tick runs to
//! completion before anything else touches the arena or its sessions.
//!
//! # A tick
//!
//! ```text
//! 1. sweep      participants no longer connected through their spawn
//!               connection die; their trails are released
//! 2. intent     each live player's pending move (default: up), wrapped
//! 3. collide    target occupied by any trail, or shared with another
//!               mover ⇒ death; otherwise the player moves
//! 4. cleanup    trails of this tick's collision deaths are released
//! 5. broadcast  die <ids> · pos <id> <x> <y>* · tick, same bytes to all
//! 6. end?       ≤1 alive of ≥2, or the lone player died
//! ```
//!
//! Collisions are decided against the board as it was before anyone
//! moved, so the result does not depend on participant order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use lightcycle_protocol::{ArenaId, Direction, PlayerId, ServerPacket};
use lightcycle_session::{Outcome, SessionRegistry};
use lightcycle_transport::ConnectionId;
use tracing::{debug, info, warn};

use crate::grid::{Cell, Grid};
use crate::rating::{competition_places, multi_elo};
use crate::snapshot::{ArenaSnapshot, PlayerSnapshot};
use crate::{ArenaConfig, ArenaError, ArenaState};

/// Counter for generating unique arena IDs.
static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

/// Move applied when a player sent nothing this tick.
pub const DEFAULT_DIRECTION: Direction = Direction::Up;

#[derive(Debug, Clone)]
struct Participant {
    id: PlayerId,
    username: String,
    /// The connection the player was spawned with. Any other connection,
    /// even a reconnect of the same user, does not count.
    connection: ConnectionId,
    head: Cell,
    died_at: Option<u64>,
}

impl Participant {
    fn is_alive(&self) -> bool {
        self.died_at.is_none()
    }
}

/// How a match ended.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub arena_id: ArenaId,
    /// Ticks played.
    pub ticks: u64,
    pub winners: Vec<String>,
    pub losers: Vec<String>,
}

/// A running (or just ended) match.
#[derive(Debug)]
pub struct Arena {
    id: ArenaId,
    grid: Grid,
    participants: Vec<Participant>,
    tick: u64,
    state: ArenaState,
    config: ArenaConfig,
}

impl Arena {
    /// Starts a match with every listed user that is currently connected.
    ///
    /// The board is `2n × 2n` (at least 2 × 2) and player `i` spawns at
    /// `(i, i)`. Each participant receives `game`, then everyone receives
    /// the opening positions.
    ///
    /// # Errors
    /// [`ArenaError::NoParticipants`] if none of the users is connected.
    pub fn start(
        usernames: &[String],
        registry: &mut SessionRegistry,
        config: ArenaConfig,
    ) -> Result<Self, ArenaError> {
        let mut joined = Vec::with_capacity(usernames.len());
        for username in usernames {
            match registry
                .get(username)
                .filter(|s| s.is_connected())
                .and_then(|s| s.connection_id())
            {
                Some(connection) => joined.push((username.clone(), connection)),
                None => warn!(%username, "not connected, left out of arena"),
            }
        }
        if joined.is_empty() {
            return Err(ArenaError::NoParticipants);
        }

        let side = (2 * joined.len() as u32).max(2);
        let mut arena = Self {
            id: ArenaId(NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed)),
            grid: Grid::new(side, side),
            participants: Vec::with_capacity(joined.len()),
            tick: 0,
            state: ArenaState::Running,
            config,
        };
        for (i, (username, connection)) in joined.into_iter().enumerate() {
            arena.spawn(username, connection, (i as u32, i as u32), registry);
        }

        let batch = arena.encode_batch(&[]);
        arena.broadcast(&batch, registry);

        info!(
            arena_id = %arena.id,
            players = arena.participants.len(),
            size = side,
            "arena started"
        );
        Ok(arena)
    }

    fn spawn(
        &mut self,
        username: String,
        connection: ConnectionId,
        cell: Cell,
        registry: &mut SessionRegistry,
    ) -> PlayerId {
        let id = PlayerId(self.participants.len() as u32);
        self.grid.occupy(cell, id);
        if let Some(session) = registry.get_mut(&username) {
            session.spawn(cell.0, cell.1);
            session.send(&ServerPacket::Game {
                width: self.grid.width(),
                height: self.grid.height(),
                player_id: id,
            });
        }
        debug!(arena_id = %self.id, %username, player_id = %id, x = cell.0, y = cell.1, "spawned");
        self.participants.push(Participant {
            id,
            username,
            connection,
            head: cell,
            died_at: None,
        });
        id
    }

    /// Adds a connected user to the running match on the first free
    /// diagonal cell. The newcomer receives `game` now and shows up in the
    /// next tick's positions.
    ///
    /// # Errors
    /// - [`ArenaError::Ended`] once the match is over
    /// - [`ArenaError::AlreadyJoined`] if the user already plays here
    /// - [`ArenaError::UnknownSession`] if the user is not connected
    /// - [`ArenaError::Full`] if every diagonal cell is taken
    pub fn try_add(
        &mut self,
        username: &str,
        registry: &mut SessionRegistry,
    ) -> Result<PlayerId, ArenaError> {
        if !self.state.is_running() {
            return Err(ArenaError::Ended(self.id));
        }
        if self.contains(username) {
            return Err(ArenaError::AlreadyJoined(username.to_string(), self.id));
        }
        let connection = registry
            .get(username)
            .filter(|s| s.is_connected())
            .and_then(|s| s.connection_id())
            .ok_or_else(|| ArenaError::UnknownSession(username.to_string()))?;

        let side = self.grid.width();
        let start = self.participants.len() as u32;
        let cell = (0..side)
            .map(|offset| {
                let k = (start + offset) % side;
                (k, k)
            })
            .find(|cell| self.grid.is_free(*cell))
            .ok_or(ArenaError::Full(self.id))?;

        let id = self.spawn(username.to_string(), connection, cell, registry);
        info!(arena_id = %self.id, %username, player_id = %id, "late join");
        Ok(id)
    }

    /// Advances one tick. Returns the outcome on the tick the match ends;
    /// `None` otherwise and on every tick after that.
    pub fn tick(&mut self, registry: &mut SessionRegistry) -> Option<MatchOutcome> {
        if !self.state.is_running() {
            return None;
        }
        self.tick += 1;

        // 1. Disconnect sweep.
        let mut died: Vec<usize> = self
            .participants
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_alive())
            .filter(|(_, p)| {
                !registry
                    .get(&p.username)
                    .is_some_and(|s| s.is_bound_to(p.connection))
            })
            .map(|(i, _)| i)
            .collect();
        for &i in &died {
            debug!(arena_id = %self.id, username = %self.participants[i].username, "disconnected, removed");
            self.kill(i, registry);
        }

        // 2. Intent.
        let mut moves: Vec<(usize, Cell)> = Vec::new();
        for (i, p) in self.participants.iter().enumerate() {
            if !p.is_alive() {
                continue;
            }
            let direction = registry
                .get_mut(&p.username)
                .and_then(|s| s.read_and_reset_action())
                .unwrap_or(DEFAULT_DIRECTION);
            moves.push((i, self.grid.step(p.head, direction)));
        }

        // 3. Collision, against the board before anyone moved.
        let mut claims: HashMap<Cell, usize> = HashMap::new();
        for (_, target) in &moves {
            *claims.entry(*target).or_default() += 1;
        }
        let (crashed, movers): (Vec<_>, Vec<_>) = moves
            .into_iter()
            .partition(|(_, target)| !self.grid.is_free(*target) || claims[target] > 1);

        for (i, target) in movers {
            let p = &mut self.participants[i];
            p.head = target;
            self.grid.occupy(target, p.id);
            if let Some(session) = registry.get_mut(&p.username) {
                session.apply_move(target.0, target.1);
            }
        }

        // 4. Cleanup.
        for &(i, _) in &crashed {
            self.kill(i, registry);
        }
        died.extend(crashed.iter().map(|(i, _)| *i));
        died.sort_unstable();

        // 5. Broadcast.
        let dead_ids: Vec<PlayerId> = died.iter().map(|&i| self.participants[i].id).collect();
        let batch = self.encode_batch(&dead_ids);
        self.broadcast(&batch, registry);

        // 6. Termination.
        let alive = self.alive_count();
        let n = self.participants.len();
        if (n == 1 && alive == 0) || (n >= 2 && alive <= 1) {
            return Some(self.finish(registry));
        }
        None
    }

    fn kill(&mut self, i: usize, registry: &mut SessionRegistry) {
        let p = &mut self.participants[i];
        p.died_at = Some(self.tick);
        if let Some(session) = registry.get_mut(&p.username) {
            for cell in session.take_trail() {
                self.grid.release(cell, p.id);
            }
            session.mark_dead();
        }
    }

    fn encode_batch(&self, dead: &[PlayerId]) -> Vec<u8> {
        let mut out = Vec::new();
        if !dead.is_empty() {
            ServerPacket::Die(dead.to_vec()).encode_into(&mut out);
        }
        for p in self.participants.iter().filter(|p| p.is_alive()) {
            ServerPacket::Pos {
                player_id: p.id,
                x: p.head.0,
                y: p.head.1,
            }
            .encode_into(&mut out);
        }
        ServerPacket::Tick.encode_into(&mut out);
        out
    }

    /// Sends `bytes` to every participant still on its spawn connection.
    fn broadcast(&self, bytes: &[u8], registry: &SessionRegistry) {
        for p in &self.participants {
            if let Some(session) = registry.get(&p.username) {
                if session.is_bound_to(p.connection) {
                    session.raw_send(bytes);
                }
            }
        }
    }

    fn finish(&mut self, registry: &mut SessionRegistry) -> MatchOutcome {
        self.state = ArenaState::Ended;

        let (winners, losers): (Vec<&Participant>, Vec<&Participant>) =
            self.participants.iter().partition(|p| p.is_alive());

        for p in &self.participants {
            if let Some(session) = registry.get_mut(&p.username) {
                session.record_outcome(if p.is_alive() {
                    Outcome::Win
                } else {
                    Outcome::Lose
                });
                // Nobody is on the board between matches.
                session.mark_dead();
            }
        }

        if self.participants.len() >= 2 && !(winners.is_empty() && losers.is_empty()) {
            self.update_ratings(registry);
        }

        let outcome = MatchOutcome {
            arena_id: self.id,
            ticks: self.tick,
            winners: winners.iter().map(|p| p.username.clone()).collect(),
            losers: losers.iter().map(|p| p.username.clone()).collect(),
        };
        info!(
            arena_id = %self.id,
            ticks = self.tick,
            winners = ?outcome.winners,
            "arena ended"
        );
        outcome
    }

    /// Winners share first place; losers rank by how long they lasted.
    fn update_ratings(&self, registry: &mut SessionRegistry) {
        let keys: Vec<u64> = self
            .participants
            .iter()
            .map(|p| p.died_at.unwrap_or(u64::MAX))
            .collect();
        let places = competition_places(&keys);
        let ratings: Vec<f64> = self
            .participants
            .iter()
            .map(|p| registry.get(&p.username).map_or(0.0, |s| s.rating()))
            .collect();
        let updated = multi_elo(&ratings, &places, self.config.rating);

        for (p, rating) in self.participants.iter().zip(updated) {
            if let Some(session) = registry.get_mut(&p.username) {
                debug!(username = %p.username, from = session.rating(), to = rating, "rating updated");
                session.set_rating(rating);
            }
        }
    }

    /// Relays `message <id> <text>` from `username` to every participant.
    ///
    /// # Errors
    /// [`ArenaError::NotParticipant`] if `username` does not play here.
    pub fn broadcast_chat(
        &self,
        username: &str,
        text: &str,
        registry: &SessionRegistry,
    ) -> Result<(), ArenaError> {
        let id = self
            .player_id(username)
            .ok_or_else(|| ArenaError::NotParticipant(username.to_string(), self.id))?;
        let packet = ServerPacket::Message {
            player_id: id,
            text: text.to_string(),
        };
        self.broadcast(&packet.encode(), registry);
        Ok(())
    }

    /// The current state as spectators see it.
    pub fn snapshot(&self, registry: &SessionRegistry) -> ArenaSnapshot {
        ArenaSnapshot {
            id: self.id,
            width: self.grid.width(),
            height: self.grid.height(),
            tick: self.tick,
            players: self
                .participants
                .iter()
                .map(|p| {
                    let session = registry.get(&p.username);
                    PlayerSnapshot {
                        id: p.id,
                        alive: p.is_alive(),
                        name: p.username.clone(),
                        pos: p.head.into(),
                        moves: session
                            .map(|s| s.trail().iter().map(|&c| c.into()).collect())
                            .unwrap_or_default(),
                        chat: session.and_then(|s| s.chat()).map(str::to_string),
                    }
                })
                .collect(),
        }
    }

    pub fn id(&self) -> ArenaId {
        self.id
    }

    pub fn state(&self) -> ArenaState {
        self.state
    }

    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    /// Ticks played so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// The id `username` plays under, if it is a participant.
    pub fn player_id(&self, username: &str) -> Option<PlayerId> {
        self.participants
            .iter()
            .find(|p| p.username == username)
            .map(|p| p.id)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.player_id(username).is_some()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn alive_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_alive()).count()
    }

    /// Who holds `cell`, if anyone.
    pub fn cell(&self, cell: Cell) -> Option<PlayerId> {
        self.grid.get(cell)
    }
}
