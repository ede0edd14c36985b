//! Slot display forwarding.
//!
//! The slot display is a separate process that animates the latest pip ranks.
//! Each update is one short-lived TCP connection carrying a UTF-8 JSON array
//! of rank labels, e.g. `["A","S","F","SS"]`. No reply is expected and the
//! connection is closed right after the send, so a missing or restarted
//! display never affects the sender.

use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;
use tracing::{debug, warn};

use crate::detection::DetectedObject;
use crate::error::{Error, Result};
use crate::rank::Rank;

/// Default slots socket port.
pub const DEFAULT_SLOTS_PORT: u16 = 54171;

/// Ranks forwarded per update.
pub const DEFAULT_TOP_K: usize = 4;

/// Largest message the listener accepts.
const MAX_MESSAGE_BYTES: u64 = 4096;

/// Sends rank updates to the slot display.
#[derive(Debug, Clone)]
pub struct SlotNotifier {
    addr: SocketAddr,
    timeout: Duration,
    top_k: usize,
}

impl SlotNotifier {
    /// Notifier for a display listening on localhost.
    pub fn localhost(port: u16) -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }

    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: Duration::from_millis(50),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Bound on connect and write time.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of leading detections forwarded per update.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Ranks of the first `top_k` detections, in detection order.
    pub fn top_ranks(&self, objects: &[DetectedObject]) -> Vec<Rank> {
        objects.iter().take(self.top_k).map(|object| object.rank).collect()
    }

    /// Send one update over a fresh connection.
    pub fn send(&self, ranks: &[Rank]) -> Result<()> {
        let payload = encode_ranks(ranks)?;

        let mut stream = TcpStream::connect_timeout(&self.addr, self.timeout)?;
        stream
            .set_write_timeout(Some(self.timeout))
            .and_then(|()| stream.write_all(&payload))
            .and_then(|()| stream.flush())
            .map_err(|e| Error::Notification(format!("write to {} failed: {}", self.addr, e)))?;
        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }

    /// Forward the top detections, swallowing every failure.
    ///
    /// A refused connection means the display is not running and is not
    /// worth a log line above debug.
    pub fn send_best_effort(&self, objects: &[DetectedObject]) {
        let ranks = self.top_ranks(objects);
        match self.send(&ranks) {
            Ok(()) => {}
            Err(Error::Io(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!(addr = %self.addr, "Slot display not listening");
            }
            Err(e) => warn!(addr = %self.addr, "Slot display send failed: {}", e),
        }
    }
}

/// Serialize a rank list to the wire format.
pub fn encode_ranks(ranks: &[Rank]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(ranks)?)
}

/// Parse one wire message.
pub fn decode_ranks(bytes: &[u8]) -> Result<Vec<Rank>> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Receiving end of the slot display protocol.
pub struct SlotListener {
    listener: TcpListener,
}

impl SlotListener {
    /// Listen on localhost. Port `0` picks a free port.
    pub fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Block until the next update arrives.
    pub fn accept_one(&self) -> Result<Vec<Rank>> {
        let (stream, peer) = self.listener.accept()?;
        debug!(%peer, "Slot update connection");

        let mut bytes = Vec::new();
        stream.take(MAX_MESSAGE_BYTES).read_to_end(&mut bytes)?;
        decode_ranks(&bytes)
    }
}
