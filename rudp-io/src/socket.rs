//! UDP socket wrapper
//!
//! The socket is configured through socket2 and then used as a blocking
//! std UDP socket with a bounded read timeout, so receive loops wake up
//! regularly and can observe a shutdown flag.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use thiserror::Error;

/// Default bound on a single blocking receive
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid socket address")]
    InvalidAddress,

    #[error("Receive timeout must be non-zero")]
    InvalidTimeout,
}

/// UDP socket with a bounded receive timeout
#[derive(Debug)]
pub struct DatagramSocket {
    inner: UdpSocket,
}

impl DatagramSocket {
    /// Create a socket bound to the given address
    pub fn bind(addr: SocketAddr, recv_timeout: Duration) -> Result<Self, SocketError> {
        if recv_timeout.is_zero() {
            return Err(SocketError::InvalidTimeout);
        }

        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.set_read_timeout(Some(recv_timeout))?;

        Ok(DatagramSocket {
            inner: socket.into(),
        })
    }

    /// Bind an ephemeral port on the loopback or wildcard address matching
    /// the family and scope of `remote`
    pub fn bind_for(remote: SocketAddr, recv_timeout: Duration) -> Result<Self, SocketError> {
        let local: SocketAddr = match (remote.is_ipv4(), remote.ip().is_loopback()) {
            (true, true) => "127.0.0.1:0",
            (true, false) => "0.0.0.0:0",
            (false, true) => "[::1]:0",
            (false, false) => "[::]:0",
        }
        .parse()
        .map_err(|_| SocketError::InvalidAddress)?;

        Self::bind(local, recv_timeout)
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.inner.local_addr()?)
    }

    /// Send data to the given address
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        Ok(self.inner.send_to(buf, target)?)
    }

    /// Receive one datagram
    ///
    /// Returns `Ok(None)` if nothing arrived within the receive timeout.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, SocketError> {
        match self.inner.recv_from(buf) {
            Ok((n, addr)) => Ok(Some((n, addr))),
            Err(e) if is_timeout(&e) => Ok(None),
            // Windows reports an ICMP port-unreachable for an earlier send
            // on the next receive; the datagram socket itself is fine.
            Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                tracing::debug!("Ignoring connection reset on datagram socket");
                Ok(None)
            }
            Err(e) => Err(SocketError::Io(e)),
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
