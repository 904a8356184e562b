/// Errors that can occur in the transport layer.
///
/// Per-connection I/O failures are not surfaced here: a failed read or
/// write simply disconnects that connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Reading the local address of the listener failed.
    #[error("local address unavailable: {0}")]
    LocalAddr(#[source] std::io::Error),
}
