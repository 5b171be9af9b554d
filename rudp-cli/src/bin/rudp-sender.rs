//! RUDP Sender - reliable bundled message sender
//!
//! Sends messages given on the command line, or one per line from stdin,
//! and reports delivery statistics once every message is acknowledged or
//! dropped.

use clap::Parser;
use rudp::Sender;
use rudp_cli::{display_sender_stats, init_logging, Config, SenderConfig};
use std::io::{self, BufRead};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "rudp-sender")]
#[command(about = "Reliable bundled message sender over UDP", long_about = None)]
struct Args {
    /// Messages to send (reads lines from stdin if none are given)
    messages: Vec<String>,

    /// Receiver address
    #[arg(short, long)]
    server: Option<SocketAddr>,

    /// Messages per bundle
    #[arg(short, long)]
    bundle_size: Option<usize>,

    /// Retransmission interval in milliseconds
    #[arg(long)]
    retransmit_ms: Option<u64>,

    /// Retransmissions before a message is dropped
    #[arg(long)]
    max_retries: Option<u32>,

    /// Pause between bundles in milliseconds
    #[arg(long)]
    bundle_interval_ms: Option<u64>,

    /// Seconds to wait for outstanding acks before exiting
    #[arg(long)]
    ack_timeout: Option<u64>,

    /// Configuration file (flags override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn sender_config(&self) -> anyhow::Result<SenderConfig> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?.sender.unwrap_or_default(),
            None => SenderConfig::default(),
        };

        if let Some(server) = self.server {
            config.server = server;
        }
        if let Some(bundle_size) = self.bundle_size {
            config.bundle_size = bundle_size;
        }
        if let Some(ms) = self.retransmit_ms {
            config.retransmit_interval_ms = ms;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(ms) = self.bundle_interval_ms {
            config.bundle_interval_ms = ms;
        }
        if let Some(secs) = self.ack_timeout {
            config.ack_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.sender_config()?;
    let messages = if args.messages.is_empty() {
        io::stdin().lock().lines().collect::<Result<Vec<_>, _>>()?
    } else {
        args.messages
    };

    if messages.is_empty() {
        anyhow::bail!("No messages to send");
    }

    let sender = Sender::connect(config.server, config.to_options())?;
    tracing::info!(
        "Sending {} messages to {} from {}",
        messages.len(),
        config.server,
        sender.local_addr()?
    );

    sender.send_messages(messages)?;

    if !sender.wait_for_acks(config.ack_timeout()) {
        tracing::warn!(
            "Gave up waiting after {:?}, {} messages unacknowledged",
            config.ack_timeout(),
            sender.pending().len()
        );
    }

    // Let late acks for the last retransmissions arrive
    std::thread::sleep(Duration::from_millis(100));

    let report = sender.stop();
    display_sender_stats(&report);

    Ok(())
}
