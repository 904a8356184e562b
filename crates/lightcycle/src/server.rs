//! `GameServer` builder and server loop.
//!
//! This is the entry point for running a lightcycle server. It ties
//! together all the layers: transport → protocol → session → arena, with
//! the [`Matchmaker`] owning everything above the sockets.

use std::net::SocketAddr;

use lightcycle_session::PlayerStore;
use lightcycle_transport::{event_channel, EventReceiver, TcpTransport};
use tokio::sync::watch;
use tracing::{error, info};

use crate::matchmaker::{Matchmaker, ServerSnapshot};
use crate::{LightcycleError, ServerConfig};

/// Port the binary listens on unless `GAME_PORT` says otherwise.
pub const DEFAULT_PORT: u16 = 4000;

/// Builder for configuring and starting a lightcycle server.
///
/// # Example
///
/// ```rust,ignore
/// use lightcycle::prelude::*;
///
/// let server = GameServerBuilder::new()
///     .bind("0.0.0.0:4000")
///     .config(ServerConfig::default())
///     .build(JsonFileStore::new("data.json"))
///     .await?;
/// server.run().await
/// ```
pub struct GameServerBuilder {
    bind_addr: String,
    config: ServerConfig,
}

impl GameServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and loads player data from `store`.
    pub async fn build<S: PlayerStore>(self, store: S) -> Result<GameServer<S>, LightcycleError> {
        let (events_tx, events) = event_channel();
        let transport =
            TcpTransport::bind(&self.bind_addr, events_tx, self.config.connection_limits()).await?;
        let matchmaker = Matchmaker::load(self.config, store).await;

        Ok(GameServer {
            transport,
            events,
            matchmaker,
        })
    }
}

impl Default for GameServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound lightcycle server.
///
/// Call [`run()`](Self::run) to start accepting connections and playing
/// matches.
pub struct GameServer<S: PlayerStore> {
    transport: TcpTransport,
    events: EventReceiver,
    matchmaker: Matchmaker<S>,
}

impl<S: PlayerStore> GameServer<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, LightcycleError> {
        Ok(self.transport.local_addr()?)
    }

    /// Spectator snapshots, updated after every tick and every match.
    pub fn subscribe(&self) -> watch::Receiver<ServerSnapshot> {
        self.matchmaker.subscribe()
    }

    /// Runs the server loop until the process is terminated.
    ///
    /// Accepted connections, connection events and timers are handled one
    /// at a time, each to completion.
    pub async fn run(mut self) -> Result<(), LightcycleError> {
        info!(addr = %self.local_addr()?, "lightcycle server running");

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => self.matchmaker.on_connection(conn),
                    Err(e) => error!(error = %e, "accept failed"),
                },
                Some((id, event)) = self.events.recv() => {
                    self.matchmaker.on_event(id, event);
                }
                timer = self.matchmaker.next_timer() => {
                    self.matchmaker.on_timer(timer).await;
                }
            }
        }
    }
}
