//! RUDP Demo - sender and receiver on loopback in one process
//!
//! Starts a receiver with simulated loss, sends a handful of messages in
//! bundles, and prints both sides' statistics.

use clap::Parser;
use rudp::{Receiver, ReceiverOptions, Sender, SenderOptions};
use rudp_cli::{display_receiver_stats, display_sender_stats, init_logging};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "rudp-demo")]
#[command(about = "Loopback demo of reliable bundled delivery", long_about = None)]
struct Args {
    /// Number of messages to send
    #[arg(short, long, default_value = "8")]
    messages: usize,

    /// Messages per bundle
    #[arg(short, long, default_value = "3")]
    bundle_size: usize,

    /// Probability of discarding a bundled message (0.0 to 1.0)
    #[arg(long, default_value = "0.3")]
    loss: f64,

    /// Loss simulator seed
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds to wait for acknowledgments
    #[arg(long, default_value = "8")]
    wait: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let start_time = Instant::now();
    let receiver = Receiver::bind(
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        ReceiverOptions {
            loss_probability: args.loss,
            seed: args.seed,
            stats_interval: None,
            ..ReceiverOptions::default()
        },
    )?;

    let sender = Sender::connect(
        receiver.local_addr()?,
        SenderOptions {
            bundle_size: args.bundle_size,
            ..SenderOptions::default()
        },
    )?;

    let messages = (1..=args.messages).map(|i| format!("Message {}", i));
    sender.send_messages(messages)?;

    if !sender.wait_for_acks(Duration::from_secs(args.wait)) {
        tracing::warn!("Timed out with {} messages pending", sender.pending().len());
    }

    let report = sender.stop();
    let receiver_stats = receiver.stop();

    display_sender_stats(&report);
    display_receiver_stats(&receiver_stats, start_time.elapsed());

    Ok(())
}
