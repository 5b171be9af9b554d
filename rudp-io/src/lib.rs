//! RUDP I/O and Platform Abstraction
//!
//! This crate provides network I/O for the RUDP endpoints: a UDP socket
//! wrapper with bounded receive timeouts, the transport trait the endpoints
//! are written against, and timing utilities.

pub mod socket;
pub mod time;
pub mod transport;

pub use socket::{DatagramSocket, SocketError, DEFAULT_RECV_TIMEOUT};
pub use time::{wait_until, Timer};
pub use transport::Transport;
