//! Unified error type for the lightcycle server.

use lightcycle_arena::ArenaError;
use lightcycle_protocol::ProtocolError;
use lightcycle_session::{SessionError, StoreError};
use lightcycle_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LightcycleError {
    /// Binding or accepting on the listening socket.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Interpreting a packet field.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Looking up or binding a session.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Loading or saving player records.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An arena refused an operation.
    #[error(transparent)]
    Arena(#[from] ArenaError),

    /// Reading the config file.
    #[error("config {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: ConfigSource,
    },
}

/// Why a config file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigSource {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
