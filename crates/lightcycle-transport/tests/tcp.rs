//! Integration tests for TCP connections: framing, limits and shutdown.
//!
//! These spin up a real listener on a random port and talk to it with a
//! plain `TcpStream`, checking both what the client reads and which
//! events the server side reports.

use std::time::Duration;

use lightcycle_protocol::{ClientPacket, Direction};
use lightcycle_transport::{
    event_channel, ConnectionEvent, ConnectionHandle, ConnectionLimits, EventReceiver,
    TcpTransport,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// =========================================================================
// Helpers
// =========================================================================

async fn connect_pair(limits: ConnectionLimits) -> (TcpStream, ConnectionHandle, EventReceiver) {
    let (tx, rx) = event_channel();
    let mut transport = TcpTransport::bind("127.0.0.1:0", tx, limits)
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr");
    let client = TcpStream::connect(addr).await.expect("should connect");
    let conn = transport.accept().await.expect("should accept");
    (client, conn, rx)
}

async fn next_event(rx: &mut EventReceiver) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event within timeout")
        .expect("channel open")
        .1
}

/// Reads until the server closes the socket.
async fn read_until_closed(client: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(3), client.read_to_end(&mut buf))
        .await
        .expect("server should close the connection")
        .expect("read should succeed");
    String::from_utf8(buf).expect("utf-8")
}

// =========================================================================
// Framing
// =========================================================================

#[tokio::test]
async fn test_packets_are_framed_across_chunks_in_order() {
    let (mut client, _conn, mut rx) = connect_pair(ConnectionLimits::default()).await;

    client.write_all(b"move|up\nmo").await.unwrap();
    client.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.write_all(b"ve|left\r\nchat|hi\n").await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        ConnectionEvent::Packet(ClientPacket::Move(Some(Direction::Up)))
    );
    assert_eq!(
        next_event(&mut rx).await,
        ConnectionEvent::Packet(ClientPacket::Move(Some(Direction::Left)))
    );
    assert_eq!(
        next_event(&mut rx).await,
        ConnectionEvent::Packet(ClientPacket::Chat("hi".into()))
    );
}

#[tokio::test]
async fn test_outbound_sends_arrive_in_order() {
    let (mut client, conn, _rx) = connect_pair(ConnectionLimits::default()).await;

    conn.raw_send(b"pos|0|1|1\n");
    conn.raw_send(b"tick\n");
    conn.disconnect();

    assert_eq!(read_until_closed(&mut client).await, "pos|0|1|1\ntick\n");
}

// =========================================================================
// Limits
// =========================================================================

#[tokio::test]
async fn test_buffer_overflow_sends_error_and_disconnects() {
    let (mut client, conn, mut rx) = connect_pair(ConnectionLimits::default()).await;

    client.write_all(&vec![b'a'; 1100]).await.unwrap();

    assert_eq!(read_until_closed(&mut client).await, "error|ERROR_PACKET_OVERFLOW\n");
    assert_eq!(next_event(&mut rx).await, ConnectionEvent::Disconnected);
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn test_join_timeout_disconnects_unjoined_connection() {
    let limits = ConnectionLimits {
        join_timeout: Duration::from_millis(100),
        ..ConnectionLimits::default()
    };
    let (mut client, _conn, mut rx) = connect_pair(limits).await;

    assert_eq!(read_until_closed(&mut client).await, "error|ERROR_JOIN_TIMEOUT\n");
    assert_eq!(next_event(&mut rx).await, ConnectionEvent::Disconnected);
}

#[tokio::test]
async fn test_mark_joined_cancels_join_timeout() {
    let limits = ConnectionLimits {
        join_timeout: Duration::from_millis(50),
        ..ConnectionLimits::default()
    };
    let (_client, conn, _rx) = connect_pair(limits).await;
    conn.mark_joined();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(conn.is_connected());
}

#[tokio::test]
async fn test_forwarded_join_stops_join_timeout() {
    let limits = ConnectionLimits {
        join_timeout: Duration::from_millis(100),
        ..ConnectionLimits::default()
    };
    let (mut client, conn, mut rx) = connect_pair(limits).await;

    client.write_all(b"join|alice|pw\n").await.unwrap();
    assert!(matches!(
        next_event(&mut rx).await,
        ConnectionEvent::Packet(ClientPacket::Join { .. })
    ));

    // Nobody calls mark_joined: the join is still queued at its owner.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(conn.is_connected());
}

#[tokio::test]
async fn test_stalled_reader_is_disconnected_at_outbound_limit() {
    let limits = ConnectionLimits {
        max_outbound_bytes: 64 * 1024,
        ..ConnectionLimits::default()
    };
    let (_client, conn, mut rx) = connect_pair(limits).await;

    // The client never reads, so kernel buffers fill and the queue grows.
    let batch = vec![b'x'; 16 * 1024];
    for _ in 0..4096 {
        if !conn.is_connected() {
            break;
        }
        conn.raw_send(&batch);
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert!(!conn.is_connected());
    assert_eq!(next_event(&mut rx).await, ConnectionEvent::Disconnected);
}

#[tokio::test]
async fn test_idle_timeout_disconnects_silent_peer() {
    let limits = ConnectionLimits {
        idle_timeout: Some(Duration::from_millis(100)),
        ..ConnectionLimits::default()
    };
    let (mut client, conn, _rx) = connect_pair(limits).await;
    conn.mark_joined();

    assert_eq!(read_until_closed(&mut client).await, "error|ERROR_AFK\n");
}

#[tokio::test]
async fn test_flood_cap_disconnects_and_stops_delivery() {
    let limits = ConnectionLimits {
        max_packets_per_second: Some(3),
        ..ConnectionLimits::default()
    };
    let (mut client, _conn, mut rx) = connect_pair(limits).await;

    client.write_all(b"move|up\n".repeat(6).as_slice()).await.unwrap();

    for _ in 0..3 {
        assert!(matches!(next_event(&mut rx).await, ConnectionEvent::Packet(_)));
    }
    assert_eq!(next_event(&mut rx).await, ConnectionEvent::Disconnected);
    assert_eq!(read_until_closed(&mut client).await, "error|ERROR_SPAM\n");
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_peer_close_emits_single_disconnect() {
    let (client, conn, mut rx) = connect_pair(ConnectionLimits::default()).await;

    drop(client);

    assert_eq!(next_event(&mut rx).await, ConnectionEvent::Disconnected);
    conn.disconnect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "no second Disconnected event");
}

#[tokio::test]
async fn test_server_disconnect_closes_socket() {
    let (mut client, conn, mut rx) = connect_pair(ConnectionLimits::default()).await;

    conn.disconnect();

    assert_eq!(read_until_closed(&mut client).await, "");
    assert_eq!(next_event(&mut rx).await, ConnectionEvent::Disconnected);
}
