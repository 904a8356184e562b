//! The matchmaker: owner of every session and the running arena.
//!
//! A single task drives a [`Matchmaker`] by feeding it accepted
//! connections, connection events and timer expiries one at a time. No
//! locks are involved: a tick, a handshake or a chat relay runs to
//! completion before the next event is looked at.
//!
//! # Match cycle
//!
//! ```text
//! idle ──(next_match_at, someone connected)──► running ──(outcome)──► cooldown
//!  ▲  └─(nobody connected: retry later)─┘                                │
//!  └───────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::net::IpAddr;

use lightcycle_arena::{Arena, ArenaSnapshot, MatchOutcome};
use lightcycle_protocol::{ClientPacket, ErrorCode, ServerPacket};
use lightcycle_session::{
    unix_millis, Credentials, PlayerSession, PlayerStore, SessionEvent, SessionRegistry,
};
use lightcycle_tick::TickScheduler;
use lightcycle_transport::{ConnectionEvent, ConnectionHandle, ConnectionId};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::config::{LateJoinPolicy, ServerConfig};
use crate::scoreboard::Standings;

// ---------------------------------------------------------------------------
// ServerSnapshot
// ---------------------------------------------------------------------------

/// What spectators see: the running game plus the standings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<ArenaSnapshot>,
    #[serde(flatten)]
    pub standings: Standings,
    /// Winners of the most recent match.
    pub last_winners: Vec<String>,
}

/// A timer the matchmaker asked to be woken for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// The running arena is due for a tick.
    Tick,
    /// Time to try starting a match.
    StartMatch,
}

// ---------------------------------------------------------------------------
// Matchmaker
// ---------------------------------------------------------------------------

pub struct Matchmaker<S: PlayerStore> {
    config: ServerConfig,
    store: S,
    registry: SessionRegistry,
    /// Every open connection, joined or not.
    connections: HashMap<ConnectionId, ConnectionHandle>,
    per_ip: HashMap<IpAddr, usize>,
    arena: Option<Arena>,
    scheduler: Option<TickScheduler>,
    /// `None` while a match is running.
    next_match_at: Option<Instant>,
    last_winners: Vec<String>,
    standings: Standings,
    snapshot: watch::Sender<ServerSnapshot>,
}

impl<S: PlayerStore> Matchmaker<S> {
    /// Loads every stored player and schedules the first match for now.
    ///
    /// A store that cannot be read is logged and treated as empty.
    pub async fn load(config: ServerConfig, store: S) -> Self {
        let records = match store.load().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "failed to load player data, starting empty");
                Default::default()
            }
        };
        info!(players = records.len(), "player data loaded");

        let mut registry = SessionRegistry::from_records(records);
        let standings = Standings::compute(&mut registry, unix_millis());
        let (snapshot, _) = watch::channel(ServerSnapshot {
            standings: standings.clone(),
            ..ServerSnapshot::default()
        });

        Self {
            config,
            store,
            registry,
            connections: HashMap::new(),
            per_ip: HashMap::new(),
            arena: None,
            scheduler: None,
            next_match_at: Some(Instant::now()),
            last_winners: Vec::new(),
            standings,
            snapshot,
        }
    }

    /// A receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ServerSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn arena(&self) -> Option<&Arena> {
        self.arena.as_ref()
    }

    /// Open connections from `ip`, joined or not.
    pub fn connections_from(&self, ip: IpAddr) -> usize {
        self.per_ip.get(&ip).copied().unwrap_or(0)
    }

    // -- connections ---------------------------------------------------------

    /// Registers a freshly accepted connection: enforces the per-IP cap,
    /// then greets it with the motd.
    pub fn on_connection(&mut self, conn: ConnectionHandle) {
        let ip = conn.ip();
        let count = self.per_ip.entry(ip).or_default();
        *count += 1;
        let count = *count;
        self.connections.insert(conn.id(), conn.clone());

        if count > self.config.max_connections_per_ip {
            info!(conn_id = %conn.id(), %ip, count, "too many connections from ip");
            conn.send_error(ErrorCode::MaxConnections, true);
            return;
        }
        debug!(conn_id = %conn.id(), addr = %conn.addr(), "client connected");
        conn.send(&ServerPacket::Motd(self.config.motd.clone()));
    }

    /// Handles one event from a connection's reader.
    pub fn on_event(&mut self, id: ConnectionId, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Packet(packet) => self.on_packet(id, packet),
            ConnectionEvent::Disconnected => self.on_disconnected(id),
        }
    }

    fn on_packet(&mut self, id: ConnectionId, packet: ClientPacket) {
        let Some(conn) = self.connections.get(&id) else {
            return;
        };
        // Still queued when the connection went away.
        if !conn.is_connected() {
            return;
        }
        if conn.is_joined() {
            self.on_player_packet(id, packet);
        } else {
            let conn = conn.clone();
            self.handshake(conn, packet);
        }
    }

    /// The first packet of a connection must be a valid `join`.
    fn handshake(&mut self, conn: ConnectionHandle, packet: ClientPacket) {
        let ClientPacket::Join { username, password } = packet else {
            debug!(conn_id = %conn.id(), "join expected");
            conn.send_error(ErrorCode::JoinExpected, true);
            return;
        };
        let credentials =
            match Credentials::validate(username.as_ref(), password.as_ref(), conn.is_loopback()) {
                Ok(credentials) => credentials,
                Err(code) => {
                    debug!(conn_id = %conn.id(), %code, "join rejected");
                    conn.send_error(code, true);
                    return;
                }
            };
        let Credentials { username, password } = credentials;

        match self.registry.get(&username).map(|s| s.password_matches(&password)) {
            Some(false) => {
                info!(conn_id = %conn.id(), %username, "wrong password");
                conn.send_error(ErrorCode::WrongPassword, true);
                return;
            }
            Some(true) => {}
            None => {
                if let Err(e) = self.registry.insert(PlayerSession::new(username.clone(), password)) {
                    warn!(error = %e, "failed to create session");
                    conn.disconnect();
                    return;
                }
            }
        }

        let conn_id = conn.id();
        match self.registry.bind(&username, conn) {
            Ok(evicted) => info!(%conn_id, %username, evicted, "player joined"),
            Err(e) => {
                warn!(%conn_id, error = %e, "failed to bind session");
                return;
            }
        }

        if self.config.late_join == LateJoinPolicy::JoinRunning {
            if let Some(arena) = self.arena.as_mut().filter(|a| a.state().is_running()) {
                if let Err(e) = arena.try_add(&username, &mut self.registry) {
                    debug!(%username, error = %e, "late join refused");
                }
            }
        }
    }

    fn on_player_packet(&mut self, id: ConnectionId, packet: ClientPacket) {
        let session = match self.registry.by_connection_mut(id) {
            Ok(session) => session,
            Err(e) => {
                debug!(error = %e, "packet from unbound connection dropped");
                return;
            }
        };
        let Some(SessionEvent::Chat(text)) = session.handle_packet(packet) else {
            return;
        };
        let username = session.username().to_string();
        if let Some(arena) = &self.arena {
            if let Err(e) = arena.broadcast_chat(&username, &text, &self.registry) {
                debug!(error = %e, "chat not relayed");
            }
        }
    }

    fn on_disconnected(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.remove(&id) else {
            return;
        };
        let ip = conn.ip();
        if let Some(count) = self.per_ip.get_mut(&ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.per_ip.remove(&ip);
            }
        }
        match self.registry.unbind(id) {
            Some(username) => info!(conn_id = %id, %username, "player disconnected"),
            None => debug!(conn_id = %id, "client disconnected"),
        }
    }

    // -- timers --------------------------------------------------------------

    /// Resolves when the next timer is due. Cancel-safe.
    pub async fn next_timer(&mut self) -> Timer {
        if let (Some(scheduler), Some(_)) = (self.scheduler.as_mut(), self.arena.as_ref()) {
            scheduler.wait_for_tick().await;
            return Timer::Tick;
        }
        match self.next_match_at {
            Some(at) => {
                time::sleep_until(at).await;
                Timer::StartMatch
            }
            None => std::future::pending().await,
        }
    }

    pub async fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Tick => self.tick().await,
            Timer::StartMatch => self.start_match(),
        }
    }

    /// Starts a match with everyone connected, or retries later.
    pub fn start_match(&mut self) {
        let usernames = self.registry.connected();
        if usernames.is_empty() {
            debug!("nobody connected, retrying later");
            self.next_match_at = Some(Instant::now() + self.config.match_retry_delay());
            return;
        }

        match Arena::start(&usernames, &mut self.registry, self.config.arena_config()) {
            Ok(arena) => {
                self.arena = Some(arena);
                self.scheduler = Some(TickScheduler::new(self.config.tick_config()));
                self.next_match_at = None;
                self.publish();
            }
            Err(e) => {
                warn!(error = %e, "failed to start match");
                self.next_match_at = Some(Instant::now() + self.config.match_retry_delay());
            }
        }
    }

    async fn tick(&mut self) {
        let Some(arena) = self.arena.as_mut() else {
            return;
        };
        let outcome = arena.tick(&mut self.registry);
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.record_tick_end();
        }
        match outcome {
            Some(outcome) => self.end_match(outcome).await,
            None => self.publish(),
        }
    }

    async fn end_match(&mut self, outcome: MatchOutcome) {
        if let Some(scheduler) = self.scheduler.take() {
            let metrics = scheduler.metrics();
            debug!(
                arena_id = %outcome.arena_id,
                ticks = metrics.total_ticks,
                overruns = metrics.total_overruns,
                max_tick_us = metrics.max_tick_time.as_micros() as u64,
                "tick metrics"
            );
        }
        self.arena = None;
        self.last_winners = outcome.winners;

        let records = self.registry.to_records();
        if let Err(e) = self.store.save(&records).await {
            warn!(error = %e, "failed to save player data");
        }

        self.standings = Standings::compute(&mut self.registry, unix_millis());
        self.publish();
        self.next_match_at = Some(Instant::now() + self.config.match_cooldown());
    }

    /// The current snapshot, built on demand.
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            game: self.arena.as_ref().map(|a| a.snapshot(&self.registry)),
            standings: self.standings.clone(),
            last_winners: self.last_winners.clone(),
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.snapshot());
    }
}
