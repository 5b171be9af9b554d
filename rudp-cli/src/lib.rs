//! RUDP CLI Library
//!
//! Shared functionality for RUDP command-line tools.

pub mod config;
pub mod stats;

pub use config::{Config, ConfigError, ReceiverConfig, SenderConfig};
pub use stats::{display_receiver_stats, display_sender_stats, format_duration, format_rtt};

use tracing_subscriber::EnvFilter;

/// Install the tracing subscriber
///
/// `RUST_LOG` takes precedence; otherwise the level is `info`, or `debug`
/// when `verbose` is set. Logs go to stderr so stdout carries only output.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
