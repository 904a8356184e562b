//! One live TCP connection: framing, limits and coalesced writes.
//!
//! Each accepted socket is split into two tasks:
//!
//! ```text
//!             ┌──────────── reader task ────────────┐
//!  socket ──→ │ line buffer → decode → flood check  │ ──→ (ConnectionId, ConnectionEvent)
//!             │ join / idle deadlines, overflow     │        on the shared event channel
//!             └─────────────────────────────────────┘
//!             ┌──────────── writer task ────────────┐
//!  socket ←── │ coalesce sends within a short window │ ←── ConnectionHandle::send / raw_send
//!             └─────────────────────────────────────┘
//! ```
//!
//! The [`ConnectionHandle`] is the only way the rest of the server talks to
//! a connection. It is cheap to clone and safe to use after the socket is
//! gone: sends on a disconnected handle are dropped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use lightcycle_protocol::{decode, ClientPacket, ErrorCode, ServerPacket};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use crate::limits::FloodGuard;
use crate::{ConnectionId, ConnectionLimits};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Size of a single socket read.
const READ_CHUNK: usize = 4096;

/// Coalesced output is flushed early once it grows past this size.
const MAX_COALESCED_BYTES: usize = 64 * 1024;

pub(crate) fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What a connection reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A complete inbound packet, in arrival order.
    Packet(ClientPacket),
    /// The connection is gone. Emitted exactly once per connection.
    Disconnected,
}

/// Sending half of the channel every connection reports into.
pub type EventSender = mpsc::UnboundedSender<(ConnectionId, ConnectionEvent)>;

/// Receiving half of the channel every connection reports into.
pub type EventReceiver = mpsc::UnboundedReceiver<(ConnectionId, ConnectionEvent)>;

/// Creates the shared event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Work item for the writer side of a connection.
#[derive(Debug)]
pub enum Outbound {
    /// Bytes to append to the outbound buffer.
    Data(Vec<u8>),
    /// Flush what is queued, then close.
    Close,
}

/// Receiving side of a connection's outbound queue. Keeps the queued byte
/// count in step with what has been taken off.
pub(crate) struct OutboundQueue {
    rx: mpsc::UnboundedReceiver<Outbound>,
    queued: Arc<AtomicUsize>,
}

impl OutboundQueue {
    pub(crate) async fn recv(&mut self) -> Option<Outbound> {
        let item = self.rx.recv().await;
        self.settle(&item);
        item
    }

    pub(crate) fn try_recv(&mut self) -> Option<Outbound> {
        let item = self.rx.try_recv().ok();
        self.settle(&item);
        item
    }

    fn settle(&self, item: &Option<Outbound>) {
        if let Some(Outbound::Data(data)) = item {
            self.queued.fetch_sub(data.len(), Ordering::AcqRel);
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionHandle
// ---------------------------------------------------------------------------

struct Shared {
    id: ConnectionId,
    addr: SocketAddr,
    connected: AtomicBool,
    joined: AtomicBool,
    outbound: mpsc::UnboundedSender<Outbound>,
    queued: Arc<AtomicUsize>,
    max_queued_bytes: usize,
    events: EventSender,
    closed: watch::Sender<bool>,
    /// Set when the peer stopped reading; aborts a blocked write.
    stalled: watch::Sender<bool>,
}

/// Handle to a live (or formerly live) connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.shared.id)
            .field("addr", &self.shared.addr)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl ConnectionHandle {
    /// Builds a handle plus the receivers its I/O side consumes.
    pub(crate) fn new_parts(
        addr: SocketAddr,
        events: EventSender,
        max_queued_bytes: usize,
    ) -> (Self, OutboundQueue, watch::Receiver<bool>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        let queued = Arc::new(AtomicUsize::new(0));
        let handle = Self {
            shared: Arc::new(Shared {
                id: next_connection_id(),
                addr,
                connected: AtomicBool::new(true),
                joined: AtomicBool::new(false),
                outbound: outbound_tx,
                queued: Arc::clone(&queued),
                max_queued_bytes,
                events,
                closed: closed_tx,
                stalled: watch::Sender::new(false),
            }),
        };
        let outbound = OutboundQueue {
            rx: outbound_rx,
            queued,
        };
        (handle, outbound, closed_rx)
    }

    /// Takes ownership of an accepted socket and starts its reader and
    /// writer tasks.
    pub fn spawn(
        stream: TcpStream,
        addr: SocketAddr,
        events: EventSender,
        limits: ConnectionLimits,
    ) -> Self {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        let (handle, outbound_rx, closed_rx) =
            Self::new_parts(addr, events, limits.max_outbound_bytes);

        tokio::spawn(read_loop(read_half, handle.clone(), limits.clone(), closed_rx));
        tokio::spawn(write_loop(
            write_half,
            handle.clone(),
            outbound_rx,
            limits.coalesce_window,
        ));

        debug!(id = %handle.id(), %addr, "connection opened");
        handle
    }

    /// The connection's unique id.
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Remote address.
    pub fn addr(&self) -> SocketAddr {
        self.shared.addr
    }

    /// Remote IP, used for per-address connection limits.
    pub fn ip(&self) -> std::net::IpAddr {
        self.shared.addr.ip()
    }

    /// Whether the peer connected from the local machine.
    pub fn is_loopback(&self) -> bool {
        match self.shared.addr.ip() {
            std::net::IpAddr::V4(ip) => ip.is_loopback(),
            std::net::IpAddr::V6(ip) => {
                ip.is_loopback() || ip.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
            }
        }
    }

    /// `false` once [`disconnect`](Self::disconnect) has run.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Cancels the join deadline. Called once the handshake succeeded.
    pub fn mark_joined(&self) {
        self.shared.joined.store(true, Ordering::Release);
    }

    /// Whether [`mark_joined`](Self::mark_joined) has been called.
    pub fn is_joined(&self) -> bool {
        self.shared.joined.load(Ordering::Acquire)
    }

    /// Queues one packet.
    pub fn send(&self, packet: &ServerPacket) {
        self.raw_send(&packet.encode());
    }

    /// Queues pre-encoded bytes, e.g. a whole tick batch.
    ///
    /// A peer that lets more than the outbound limit pile up unread is
    /// disconnected without a flush.
    pub fn raw_send(&self, bytes: &[u8]) {
        if !self.is_connected() || bytes.is_empty() {
            return;
        }
        let queued = self.shared.queued.fetch_add(bytes.len(), Ordering::AcqRel) + bytes.len();
        if queued > self.shared.max_queued_bytes {
            debug!(id = %self.shared.id, queued, "outbound buffer overflow");
            self.shared.stalled.send_replace(true);
            self.disconnect();
            return;
        }
        let _ = self.shared.outbound.send(Outbound::Data(bytes.to_vec()));
    }

    /// Bytes queued for the writer and not yet taken off the queue.
    pub fn queued_bytes(&self) -> usize {
        self.shared.queued.load(Ordering::Acquire)
    }

    /// Sends `error <code>`, optionally followed by a disconnect.
    pub fn send_error(&self, code: ErrorCode, disconnect: bool) {
        self.send(&ServerPacket::Error(code));
        if disconnect {
            self.disconnect();
        }
    }

    /// Closes the connection. Idempotent: only the first call flushes,
    /// closes and emits [`ConnectionEvent::Disconnected`].
    pub fn disconnect(&self) {
        if !self.shared.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        let _ = self.shared.outbound.send(Outbound::Close);
        self.shared.closed.send_replace(true);
        let _ = self
            .shared
            .events
            .send((self.shared.id, ConnectionEvent::Disconnected));
        debug!(id = %self.shared.id, addr = %self.shared.addr, "connection closed");
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.shared.events.send((self.shared.id, event));
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Deadline bookkeeping for the reader.
struct Deadlines<'a> {
    limits: &'a ConnectionLimits,
    join_by: Instant,
    last_activity: Instant,
}

impl Deadlines<'_> {
    fn next(&self, joined: bool) -> Option<Instant> {
        let join = (!joined).then_some(self.join_by);
        let idle = self.limits.idle_timeout.map(|d| self.last_activity + d);
        match (join, idle) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn expired(&self, joined: bool, now: Instant) -> Option<ErrorCode> {
        if !joined && now >= self.join_by {
            return Some(ErrorCode::JoinTimeout);
        }
        match self.limits.idle_timeout {
            Some(idle) if now >= self.last_activity + idle => Some(ErrorCode::Afk),
            _ => None,
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    handle: ConnectionHandle,
    limits: ConnectionLimits,
    mut closed: watch::Receiver<bool>,
) {
    let id = handle.id();
    let now = Instant::now();
    let mut deadlines = Deadlines {
        limits: &limits,
        join_by: now + limits.join_timeout,
        last_activity: now,
    };
    let mut flood = FloodGuard::new(limits.max_packets_per_second);
    // A forwarded join stops the join deadline even before the owner has
    // processed it.
    let mut join_seen = false;
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    while handle.is_connected() {
        let deadline = deadlines.next(join_seen || handle.is_joined());

        let n = tokio::select! {
            _ = closed.changed() => break,
            _ = sleep_until_opt(deadline) => {
                if let Some(code) = deadlines.expired(join_seen || handle.is_joined(), Instant::now()) {
                    debug!(%id, %code, "connection deadline expired");
                    handle.send_error(code, true);
                    break;
                }
                continue;
            }
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    debug!(%id, "peer closed connection");
                    handle.disconnect();
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::ConnectionReset {
                        debug!(%id, "connection reset by peer");
                    } else {
                        warn!(%id, error = %e, "read failed");
                    }
                    handle.disconnect();
                    break;
                }
            },
        };

        deadlines.last_activity = Instant::now();
        pending.extend_from_slice(&chunk[..n]);

        let (packets, rest) = decode(&pending);
        let consumed = pending.len() - rest.len();
        for raw in packets {
            if !handle.is_connected() {
                break;
            }
            if !flood.admit(Instant::now()) {
                debug!(%id, "packet rate exceeded");
                handle.send_error(ErrorCode::Spam, true);
                break;
            }
            trace!(%id, tag = raw.tag(), "packet received");
            let packet = ClientPacket::from_raw(raw);
            join_seen |= matches!(packet, ClientPacket::Join { .. });
            handle.emit(ConnectionEvent::Packet(packet));
        }
        pending.drain(..consumed);

        if handle.is_connected() && pending.len() > limits.max_pending_bytes {
            debug!(%id, pending = pending.len(), "inbound buffer overflow");
            handle.send_error(ErrorCode::PacketOverflow, true);
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

async fn write_loop(
    mut writer: OwnedWriteHalf,
    handle: ConnectionHandle,
    mut outbound: OutboundQueue,
    window: Duration,
) {
    let id = handle.id();
    let mut stalled = handle.shared.stalled.subscribe();
    let mut buf: Vec<u8> = Vec::new();
    let mut closing = false;

    while !closing {
        match outbound.recv().await {
            Some(Outbound::Data(data)) => buf.extend_from_slice(&data),
            Some(Outbound::Close) | None => closing = true,
        }

        // Every new append re-arms the window.
        while !closing && buf.len() < MAX_COALESCED_BYTES {
            match time::timeout(window, outbound.recv()).await {
                Ok(Some(Outbound::Data(data))) => buf.extend_from_slice(&data),
                Ok(Some(Outbound::Close)) | Ok(None) => closing = true,
                Err(_) => break,
            }
        }

        if !buf.is_empty() {
            let written = tokio::select! {
                result = writer.write_all(&buf) => result,
                _ = stalled.wait_for(|s| *s) => Err(std::io::ErrorKind::WouldBlock.into()),
            };
            if let Err(e) = written {
                debug!(%id, error = %e, "write failed");
                handle.disconnect();
                closing = true;
            }
            trace!(%id, bytes = buf.len(), "flushed");
            buf.clear();
        }
    }

    let _ = writer.shutdown().await;
}
