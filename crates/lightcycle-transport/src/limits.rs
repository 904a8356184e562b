//! Per-connection resource limits.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Limits enforced by each connection's reader task.
#[derive(Debug, Clone)]
pub struct ConnectionLimits {
    /// Disconnect with `ERROR_JOIN_TIMEOUT` if the connection has not been
    /// marked joined within this window.
    pub join_timeout: Duration,

    /// Disconnect with `ERROR_AFK` after this long without inbound data.
    /// `None` disables the check.
    pub idle_timeout: Option<Duration>,

    /// Disconnect with `ERROR_SPAM` when more packets than this arrive
    /// within one second. `None` disables the check.
    pub max_packets_per_second: Option<u32>,

    /// Disconnect with `ERROR_PACKET_OVERFLOW` when more than this many
    /// bytes are buffered without a line terminator.
    pub max_pending_bytes: usize,

    /// Outbound sends arriving within this window are written together.
    pub coalesce_window: Duration,

    /// Disconnect when more than this many bytes are queued for a peer
    /// that is not reading.
    pub max_outbound_bytes: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(5),
            idle_timeout: None,
            max_packets_per_second: None,
            max_pending_bytes: 1024,
            coalesce_window: Duration::from_millis(1),
            max_outbound_bytes: 1024 * 1024,
        }
    }
}

/// Sliding one-second window of inbound packet arrivals.
#[derive(Debug)]
pub(crate) struct FloodGuard {
    cap: Option<u32>,
    arrivals: VecDeque<Instant>,
}

impl FloodGuard {
    const WINDOW: Duration = Duration::from_secs(1);

    pub(crate) fn new(cap: Option<u32>) -> Self {
        Self {
            cap,
            arrivals: VecDeque::new(),
        }
    }

    /// Records one packet at `now`. Returns `false` once the cap is exceeded.
    pub(crate) fn admit(&mut self, now: Instant) -> bool {
        let Some(cap) = self.cap else {
            return true;
        };
        while let Some(front) = self.arrivals.front() {
            if now.duration_since(*front) >= Self::WINDOW {
                self.arrivals.pop_front();
            } else {
                break;
            }
        }
        self.arrivals.push_back(now);
        self.arrivals.len() <= cap as usize
    }
}
