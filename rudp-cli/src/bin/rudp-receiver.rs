//! RUDP Receiver - reliable bundled message receiver
//!
//! Acknowledges every message it delivers, writes delivered messages to
//! stdout in sequence order per sender, and optionally simulates loss.

use clap::Parser;
use crossbeam::channel::RecvTimeoutError;
use rudp::Receiver;
use rudp_cli::{display_receiver_stats, init_logging, Config, ReceiverConfig};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "rudp-receiver")]
#[command(about = "Reliable bundled message receiver over UDP", long_about = None)]
struct Args {
    /// Listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Probability of discarding a bundled message (0.0 to 1.0)
    #[arg(long)]
    loss: Option<f64>,

    /// Loss simulator seed
    #[arg(long)]
    seed: Option<u64>,

    /// Reorder window capacity per sender
    #[arg(long)]
    window: Option<usize>,

    /// Statistics interval in seconds (0 disables)
    #[arg(long)]
    stats: Option<u64>,

    /// Stop after this many seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Configuration file (flags override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn receiver_config(&self) -> anyhow::Result<ReceiverConfig> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?.receiver.unwrap_or_default(),
            None => ReceiverConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(loss) = self.loss {
            config.loss_probability = loss;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(window) = self.window {
            config.window_capacity = window;
        }
        if let Some(stats) = self.stats {
            config.stats_interval_secs = stats;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.receiver_config()?;
    let receiver = Receiver::bind(config.listen, config.to_options())?;

    let start_time = Instant::now();
    let deadline = args.duration.map(|secs| start_time + Duration::from_secs(secs));
    let mut stdout = io::stdout().lock();

    tracing::info!("Ready to receive messages...");

    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        match receiver.deliveries().recv_timeout(Duration::from_millis(100)) {
            Ok(delivery) => {
                writeln!(stdout, "{}", delivery.message.content)?;
                stdout.flush()?;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let stats = receiver.stop();
    display_receiver_stats(&stats, start_time.elapsed());

    Ok(())
}
