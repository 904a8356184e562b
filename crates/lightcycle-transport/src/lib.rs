//! Transport layer for lightcycle.
//!
//! Owns the TCP sockets. Each accepted socket becomes a
//! [`ConnectionHandle`] plus a reader and a writer task; everything a
//! connection observes is reported as a [`ConnectionEvent`] on one shared
//! channel, so a single consumer sees all connections' packets in order.
//!
//! # Feature Flags
//!
//! - `test-util`: socketless connections ([`ConnectionHandle::memory`],
//!   [`MemoryPeer`]) for driving sessions and arenas in tests.

mod connection;
mod error;
mod limits;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod tcp;

pub use connection::{
    event_channel, ConnectionEvent, ConnectionHandle, EventReceiver, EventSender, Outbound,
};
pub use error::TransportError;
pub use limits::ConnectionLimits;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryPeer;
pub use tcp::TcpTransport;

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
