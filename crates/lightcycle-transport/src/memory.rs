//! In-memory connections for tests.
//!
//! A [`MemoryPeer`] stands in for the remote end of a connection: it sees
//! exactly the bytes the server would have written to the socket, and
//! whether the server closed it.

use std::net::SocketAddr;

use crate::connection::OutboundQueue;
use crate::{
    event_channel, ConnectionEvent, ConnectionHandle, ConnectionId, ConnectionLimits,
    EventReceiver, EventSender, Outbound,
};

/// The far side of an in-memory connection.
pub struct MemoryPeer {
    outbound: OutboundQueue,
    events: Option<EventReceiver>,
    received: Vec<u8>,
    closed: bool,
}

impl ConnectionHandle {
    /// Creates a connection that is not backed by a socket, reporting into
    /// its own event channel (see [`MemoryPeer::events`]).
    pub fn memory(addr: SocketAddr) -> (Self, MemoryPeer) {
        let (tx, rx) = event_channel();
        let (handle, mut peer) = Self::memory_with_events(addr, tx);
        peer.events = Some(rx);
        (handle, peer)
    }

    /// Creates a socketless connection reporting into a shared channel.
    pub fn memory_with_events(addr: SocketAddr, events: EventSender) -> (Self, MemoryPeer) {
        let limit = ConnectionLimits::default().max_outbound_bytes;
        let (handle, outbound, _closed) = Self::new_parts(addr, events, limit);
        let peer = MemoryPeer {
            outbound,
            events: None,
            received: Vec::new(),
            closed: false,
        };
        (handle, peer)
    }
}

impl MemoryPeer {
    fn pump(&mut self) {
        while let Some(item) = self.outbound.try_recv() {
            match item {
                Outbound::Data(data) if !self.closed => self.received.extend_from_slice(&data),
                Outbound::Data(_) => {}
                Outbound::Close => self.closed = true,
            }
        }
    }

    /// Drains everything written so far as complete lines, terminators removed.
    pub fn lines(&mut self) -> Vec<String> {
        self.pump();
        let text = String::from_utf8_lossy(&self.received).into_owned();
        self.received.clear();
        text.lines().map(str::to_string).collect()
    }

    /// Whether the server closed this connection.
    pub fn is_closed(&mut self) -> bool {
        self.pump();
        self.closed
    }

    /// Events emitted by a connection created with [`ConnectionHandle::memory`].
    pub fn events(&mut self) -> Vec<(ConnectionId, ConnectionEvent)> {
        let mut out = Vec::new();
        if let Some(rx) = self.events.as_mut() {
            while let Ok(ev) = rx.try_recv() {
                out.push(ev);
            }
        }
        out
    }
}
