//! Receiving endpoint
//!
//! A [`Receiver`] serves one socket from a background thread. Each inbound
//! datagram goes through [`ReceiverState`]; every message it releases is
//! published on the [`Receiver::deliveries`] queue and then acknowledged to
//! the endpoint it came from, in delivery order.

use crate::error::{EndpointError, Result};
use crossbeam::channel;
use parking_lot::Mutex;
use rudp_io::{DatagramSocket, Timer, Transport, DEFAULT_RECV_TIMEOUT};
use rudp_protocol::{
    Frame, LossModel, LossSimulator, NoLoss, ReceiverState, ReceiverStats, SeqNumber, WireMessage,
    DEFAULT_LOSS_PROBABILITY, DEFAULT_WINDOW_CAPACITY, RECV_BUFFER_SIZE,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default interval between statistics reports
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(10);

const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Receiver configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverOptions {
    /// Probability in `[0, 1]` that a bundled message is discarded on arrival
    pub loss_probability: f64,
    /// Seed for the loss simulator; random if unset
    pub seed: Option<u64>,
    /// Reorder window capacity per remote endpoint
    pub window_capacity: usize,
    /// Receive timeout of the serving thread
    pub recv_timeout: Duration,
    /// Period of the statistics report; no reports if unset
    pub stats_interval: Option<Duration>,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        ReceiverOptions {
            loss_probability: DEFAULT_LOSS_PROBABILITY,
            seed: None,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            stats_interval: Some(DEFAULT_STATS_INTERVAL),
        }
    }
}

impl ReceiverOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.loss_probability) {
            return Err(EndpointError::InvalidOptions(format!(
                "loss probability {} outside [0, 1]",
                self.loss_probability
            )));
        }
        if self.window_capacity == 0 {
            return Err(EndpointError::InvalidOptions(
                "window capacity must be at least 1".to_string(),
            ));
        }
        if self.recv_timeout.is_zero() {
            return Err(EndpointError::InvalidOptions(
                "receive timeout must be non-zero".to_string(),
            ));
        }
        if self.stats_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(EndpointError::InvalidOptions(
                "stats interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Loss model described by these options
    pub fn loss_model(&self) -> Box<dyn LossModel> {
        if self.loss_probability == 0.0 {
            return Box::new(NoLoss);
        }
        let simulator = match self.seed {
            Some(seed) => LossSimulator::with_seed(self.loss_probability, seed),
            None => LossSimulator::new(self.loss_probability),
        };
        info!(
            "Simulating {:.0}% message loss (seed {})",
            simulator.probability() * 100.0,
            simulator.seed()
        );
        Box::new(simulator)
    }
}

/// A message released in order to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: SocketAddr,
    pub message: WireMessage,
}

struct Shared {
    state: Mutex<ReceiverState>,
    stopped: AtomicBool,
    transport: Arc<dyn Transport>,
}

impl Shared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Reliable receiving endpoint
pub struct Receiver {
    shared: Arc<Shared>,
    deliveries: channel::Receiver<Delivery>,
    server: Option<JoinHandle<()>>,
    reporter: Option<JoinHandle<()>>,
}

impl Receiver {
    /// Bind `addr` and start serving
    pub fn bind(addr: SocketAddr, options: ReceiverOptions) -> Result<Self> {
        options.validate()?;
        let socket = DatagramSocket::bind(addr, options.recv_timeout)?;
        Self::start(Arc::new(socket), options)
    }

    /// Start serving an existing transport
    pub fn start(transport: Arc<dyn Transport>, options: ReceiverOptions) -> Result<Self> {
        options.validate()?;
        let loss = options.loss_model();
        Self::start_with_loss(transport, loss, options)
    }

    /// Start serving with an explicit loss model, ignoring the loss settings
    /// in `options`
    pub fn start_with_loss(
        transport: Arc<dyn Transport>,
        loss: Box<dyn LossModel>,
        options: ReceiverOptions,
    ) -> Result<Self> {
        options.validate()?;

        let local_addr = transport.local_addr()?;
        let shared = Arc::new(Shared {
            state: Mutex::new(ReceiverState::new(loss, options.window_capacity)),
            stopped: AtomicBool::new(false),
            transport,
        });
        let (delivery_tx, deliveries) = channel::unbounded();

        let server = thread::Builder::new()
            .name("rudp-receiver".to_string())
            .spawn({
                let shared = shared.clone();
                move || run_server(shared, delivery_tx)
            })
            .map_err(|source| EndpointError::Spawn {
                name: "receiver",
                source,
            })?;

        let mut receiver = Receiver {
            shared,
            deliveries,
            server: Some(server),
            reporter: None,
        };

        if let Some(interval) = options.stats_interval {
            let shared = receiver.shared.clone();
            receiver.reporter = Some(
                thread::Builder::new()
                    .name("rudp-stats".to_string())
                    .spawn(move || run_reporter(shared, interval))
                    .map_err(|source| EndpointError::Spawn {
                        name: "stats",
                        source,
                    })?,
            );
        }

        info!("Receiver listening on {}", local_addr);
        Ok(receiver)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.shared.transport.local_addr()?)
    }

    /// Queue of in-order deliveries
    ///
    /// Every acknowledged message is queued here before its ack is sent. The
    /// queue is unbounded, so deliveries accumulate until they are read.
    pub fn deliveries(&self) -> &channel::Receiver<Delivery> {
        &self.deliveries
    }

    /// Next sequence number expected from `addr`
    pub fn expected(&self, addr: &SocketAddr) -> Option<SeqNumber> {
        self.shared.state.lock().expected(addr)
    }

    /// Statistics snapshot
    pub fn stats(&self) -> ReceiverStats {
        self.shared.state.lock().stats()
    }

    /// Stop serving and return the final statistics
    pub fn stop(mut self) -> ReceiverStats {
        self.shutdown();
        self.stats()
    }

    fn shutdown(&mut self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        for handle in [self.server.take(), self.reporter.take()].into_iter().flatten() {
            if handle.join().is_err() {
                warn!("Receiver thread panicked");
            }
        }
        debug!("Receiver stopped");
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_server(shared: Arc<Shared>, deliveries: channel::Sender<Delivery>) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    while !shared.is_stopped() {
        let (n, from) = match shared.transport.recv_from(&mut buf) {
            Ok(Some(received)) => received,
            Ok(None) => continue,
            Err(e) => {
                if !shared.is_stopped() {
                    warn!("Receive error: {}", e);
                    thread::sleep(RECV_ERROR_BACKOFF);
                }
                continue;
            }
        };

        let dispatch = match shared.state.lock().handle_datagram(from, &buf[..n]) {
            Ok(dispatch) => dispatch,
            Err(e) => {
                warn!("Malformed datagram from {}: {}", from, e);
                continue;
            }
        };

        for message in dispatch.delivered {
            info!("PROCESS seq={} from {}: {}", message.seq, from, message.content);
            let seq = message.seq;
            if deliveries.send(Delivery { from, message }).is_err() {
                debug!("Delivery queue closed, not acknowledging seq={}", seq);
                continue;
            }
            let sent = send_ack(&shared, seq, from);
            shared.state.lock().record_ack(sent);
        }
    }
}

fn send_ack(shared: &Shared, seq: SeqNumber, to: SocketAddr) -> bool {
    let datagram = match Frame::ack(seq).to_bytes() {
        Ok(datagram) => datagram,
        Err(e) => {
            warn!("Failed to encode ack for seq={}: {}", seq, e);
            return false;
        }
    };

    match shared.transport.send_to(&datagram, to) {
        Ok(_) => {
            debug!("ACK seq={} to {}", seq, to);
            true
        }
        Err(e) => {
            warn!("Failed to send ack for seq={} to {}: {}", seq, to, e);
            false
        }
    }
}

fn run_reporter(shared: Arc<Shared>, interval: Duration) {
    let mut timer = Timer::new(interval);
    let tick = interval.min(Duration::from_millis(100));

    while !shared.is_stopped() {
        thread::sleep(tick.min(timer.time_until_expiration()).max(Duration::from_millis(1)));
        if !timer.try_fire() {
            continue;
        }

        let stats = shared.state.lock().stats();
        info!(
            "Stats: {} packets, {} processed, {} buffered, {} duplicates, {} lost, {} acks, {} clients",
            stats.total_packets,
            stats.messages_processed,
            stats.messages_buffered,
            stats.duplicates_dropped,
            stats.packets_lost,
            stats.acks_sent,
            stats.active_clients
        );
    }
}
