//! Datagram transport to the Entry Point.
//!
//! A [`Connection`] owns one UDP socket bound on loopback. Requests are sent
//! as [`Packet`]s (8 flag bytes followed by NUL-terminated text) to the
//! Entry Point address; replies arrive as plain NUL-terminated text on the
//! connection's own port.
//!
//! # Lifecycle
//!
//! A connection is open from [`Connection::connect`] until
//! [`Connection::close`]. Every operation on a closed connection fails with
//! [`TransportError::Closed`] instead of blocking.
use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket},
    time::{Duration, Instant},
};

use log::{debug, error, info, trace, warn};
use thiserror::Error;

use super::{FrontApiError, Header, Message, decode::decode_header, encode::encode_message};

/// Well-known port of the Entry Point on loopback.
pub const ENTRY_POINT_PORT: u16 = 10100;
pub const ENTRY_POINT_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, ENTRY_POINT_PORT));

/// Size of the datagram buffer, flags included.
pub const PACKET_BUF_SIZE: usize = 2048;
pub const FLAGS_LEN: usize = 8;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport IO error: {0}")]
    Io(#[from] io::Error),

    #[error("no reply for transaction {txn_id} after {elapsed:?}")]
    Timeout { txn_id: i32, elapsed: Duration },

    #[error("connection is closed")]
    Closed,

    #[error("packet of {size} bytes exceeds the {max} byte limit")]
    PacketTooLarge { size: usize, max: usize },

    #[error("sent {sent} of {expected} bytes")]
    PartialSend { sent: usize, expected: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Local port replies are received on; 0 picks an ephemeral port.
    pub own_port: u16,
    /// Socket receive timeout, also the overall reply deadline.
    pub timeout: Duration,
    pub entry_point: SocketAddr,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            own_port: 0,
            timeout: DEFAULT_TIMEOUT,
            entry_point: ENTRY_POINT_ADDR,
        }
    }
}

/// Outgoing datagram: zeroed flags followed by NUL-terminated text.
pub struct Packet {
    buf: [u8; PACKET_BUF_SIZE],
    len: usize,
}

impl Packet {
    fn empty() -> Self {
        Self {
            buf: [0; PACKET_BUF_SIZE],
            len: FLAGS_LEN,
        }
    }

    /// Wraps already encoded text.
    pub fn from_text(text: &str) -> Result<Self, TransportError> {
        let size = FLAGS_LEN + text.len() + 1;
        if size > PACKET_BUF_SIZE {
            return Err(TransportError::PacketTooLarge {
                size,
                max: PACKET_BUF_SIZE,
            });
        }

        let mut packet = Self::empty();
        packet.buf[FLAGS_LEN..FLAGS_LEN + text.len()].copy_from_slice(text.as_bytes());
        packet.len = size;
        Ok(packet)
    }

    /// Encodes `message` straight into the packet buffer.
    pub fn encode(message: &Message<'_>) -> Result<Self, FrontApiError> {
        let mut packet = Self::empty();
        let len = encode_message(message, &mut packet.buf[FLAGS_LEN..])?;
        packet.len = FLAGS_LEN + len + 1;
        Ok(packet)
    }

    pub fn flags(&self) -> &[u8] {
        &self.buf[..FLAGS_LEN]
    }

    /// Payload text without the terminator.
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.buf[FLAGS_LEN..self.len - 1]).unwrap_or_default()
    }

    /// Declared length: flags, text and terminator.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == FLAGS_LEN
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

#[derive(Debug)]
pub struct Connection {
    socket: Option<UdpSocket>,
    peer: SocketAddr,
    timeout: Duration,
}

impl Connection {
    /// Binds the reply port on loopback and fixes the Entry Point peer.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, config.own_port)).map_err(|e| {
            error!("could not initialize socket on port {}: {e}", config.own_port);
            e
        })?;

        // a zero duration is rejected by the socket; treat it as "no timeout"
        let read_timeout = Some(config.timeout).filter(|t| !t.is_zero());
        socket.set_read_timeout(read_timeout).map_err(|e| {
            error!("could not set timeout: {e}");
            e
        })?;

        info!(
            "connected to entry point {} from {}",
            config.entry_point,
            socket.local_addr()?
        );
        Ok(Self {
            socket: Some(socket),
            peer: config.entry_point,
            timeout: config.timeout,
        })
    }

    fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket.as_ref().ok_or(TransportError::Closed)
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_port(&self) -> Result<u16, TransportError> {
        Ok(self.socket()?.local_addr()?.port())
    }

    /// Sends exactly the packet's declared length to the Entry Point.
    pub fn send(&self, packet: &Packet) -> Result<(), TransportError> {
        let bytes = packet.as_bytes();
        let sent = self.socket()?.send_to(bytes, self.peer).map_err(|e| {
            error!("could not send packet to entry point: {e}");
            e
        })?;

        if sent != bytes.len() {
            error!("short send to entry point ({sent} of {} bytes)", bytes.len());
            return Err(TransportError::PartialSend {
                sent,
                expected: bytes.len(),
            });
        }
        trace!("sent {sent} bytes to {}", self.peer);
        Ok(())
    }

    /// One blocking receive, bounded by the socket timeout.
    ///
    /// The datagram is NUL-terminated inside `buf`, so at most
    /// `buf.len() - 1` bytes are received.
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let socket = self.socket()?;
        let Some(cap) = buf.len().checked_sub(1) else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty receive buffer").into());
        };

        let (n, from) = socket.recv_from(&mut buf[..cap])?;
        buf[n] = 0;
        trace!("received {n} bytes from {from}");
        Ok(n)
    }

    /// Waits for the reply carrying `txn_id`, discarding other datagrams.
    ///
    /// Gives up once more than `timeout` has elapsed; since each receive is
    /// bounded by the socket timeout, the wait can overrun `timeout` by up to
    /// one socket timeout. Hard socket errors end the wait immediately.
    pub fn receive_matching(
        &self,
        txn_id: i32,
        timeout: Duration,
        buf: &mut [u8],
    ) -> Result<(usize, Header), TransportError> {
        let start = Instant::now();

        loop {
            buf.fill(0);
            match self.receive(buf) {
                Ok(n) => {
                    let text = String::from_utf8_lossy(&buf[..n]);
                    match decode_header(&text) {
                        Ok(header) if header.txn_id == txn_id => return Ok((n, header)),
                        Ok(header) => debug!(
                            "discarding reply for transaction {} (waiting for {txn_id})",
                            header.txn_id
                        ),
                        Err(e) => debug!("discarding unparsable datagram: {e}"),
                    }
                }
                Err(TransportError::Io(e)) if is_transient(&e) => {
                    trace!("receive interrupted or timed out: {e}");
                }
                Err(e) => {
                    error!("could not receive answer from entry point: {e}");
                    return Err(e);
                }
            }

            let elapsed = start.elapsed();
            if elapsed > timeout {
                warn!("timed out waiting for transaction {txn_id} after {elapsed:?}");
                return Err(TransportError::Timeout { txn_id, elapsed });
            }
        }
    }

    /// Releases the socket. Calling it again is a no-op.
    pub fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            if let Ok(addr) = socket.local_addr() {
                info!("closing connection on {addr}");
            }
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
