//! Endpoint errors

use rudp_io::SocketError;
use rudp_protocol::WireError;
use thiserror::Error;

/// Errors raised by the sender and receiver endpoints
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("Socket error: {0}")]
    Socket(#[from] SocketError),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Endpoint stopped")]
    Stopped,

    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EndpointError>;
