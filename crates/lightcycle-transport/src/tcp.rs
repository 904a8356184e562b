//! TCP listener that turns accepted sockets into connections.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::{ConnectionHandle, ConnectionLimits, EventSender, TransportError};

/// Listens for game clients on a TCP port.
pub struct TcpTransport {
    listener: TcpListener,
    events: EventSender,
    limits: ConnectionLimits,
}

impl TcpTransport {
    /// Binds to `addr`. Every accepted connection reports into `events`.
    pub async fn bind(
        addr: &str,
        events: EventSender,
        limits: ConnectionLimits,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::info!(addr, "tcp transport listening");
        Ok(Self {
            listener,
            events,
            limits,
        })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::LocalAddr)
    }

    /// Waits for the next client and starts its reader and writer tasks.
    pub async fn accept(&mut self) -> Result<ConnectionHandle, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(ConnectionHandle::spawn(
            stream,
            addr,
            self.events.clone(),
            self.limits.clone(),
        ))
    }
}
