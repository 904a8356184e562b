//! Error types for the session layer.

use std::path::PathBuf;

/// Errors from session bookkeeping.
///
/// These are engine invariant errors: callers log them and carry on.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given username.
    #[error("no session for user {0:?}")]
    NotFound(String),

    /// A session with this username already exists.
    #[error("session for user {0:?} already exists")]
    AlreadyExists(String),

    /// No session is bound to the given connection.
    #[error("no session bound to {0}")]
    Unbound(lightcycle_transport::ConnectionId),
}

/// Errors from loading or saving player records.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("player store I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing data is not valid JSON of the expected shape.
    #[error("malformed player data: {0}")]
    Json(#[from] serde_json::Error),
}
