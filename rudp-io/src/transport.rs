//! Datagram transport abstraction
//!
//! Endpoints talk to the network only through [`Transport`], which keeps
//! the sender and receiver runtimes independent of the concrete socket.

use crate::socket::{DatagramSocket, SocketError};
use std::net::SocketAddr;

/// Connectionless, unreliable datagram transport
pub trait Transport: Send + Sync {
    /// Send one datagram
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError>;

    /// Receive one datagram, waiting at most the transport's receive timeout
    ///
    /// Returns `Ok(None)` on timeout.
    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, SocketError>;

    /// Local address of the transport
    fn local_addr(&self) -> Result<SocketAddr, SocketError>;
}

impl Transport for DatagramSocket {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> Result<usize, SocketError> {
        DatagramSocket::send_to(self, buf, target)
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, SocketError> {
        DatagramSocket::recv_from(self, buf)
    }

    fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        DatagramSocket::local_addr(self)
    }
}
