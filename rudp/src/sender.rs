//! Sending endpoint
//!
//! A [`Sender`] owns two background threads next to the caller's thread:
//!
//! - the ack listener, which receives acknowledgments and retires pending
//!   messages
//! - the retransmission scheduler, which sleeps until the earliest pending
//!   deadline and resends or drops due messages
//!
//! All protocol state sits in one [`SenderState`] behind a mutex. No thread
//! holds that mutex across a network call.

use crate::error::{EndpointError, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use parking_lot::{Condvar, Mutex};
use rudp_io::{time, DatagramSocket, Transport, DEFAULT_RECV_TIMEOUT};
use rudp_protocol::pending::{DEFAULT_MAX_RETRIES, DEFAULT_RETRANSMIT_INTERVAL};
use rudp_protocol::{
    AckOutcome, Frame, RetransmitPolicy, SenderState, SenderStats, SeqNumber, DEFAULT_BUNDLE_SIZE,
    RECV_BUFFER_SIZE,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default pause between consecutive bundles in [`Sender::send_messages`]
pub const DEFAULT_BUNDLE_INTERVAL: Duration = Duration::from_millis(200);

/// Longest the scheduler sleeps without re-checking its deadline
const MAX_SCHEDULER_WAIT: Duration = Duration::from_secs(1);

/// Pause after a transport receive error
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Sender configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SenderOptions {
    /// Messages per bundle
    pub bundle_size: usize,
    /// Time between transmissions of an unacknowledged message
    pub retransmit_interval: Duration,
    /// Retransmissions before a message is dropped
    pub max_retries: u32,
    /// Pause between bundles when sending a batch
    pub bundle_interval: Duration,
    /// Receive timeout of the ack listener
    pub recv_timeout: Duration,
}

impl Default for SenderOptions {
    fn default() -> Self {
        SenderOptions {
            bundle_size: DEFAULT_BUNDLE_SIZE,
            retransmit_interval: DEFAULT_RETRANSMIT_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            bundle_interval: DEFAULT_BUNDLE_INTERVAL,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
        }
    }
}

impl SenderOptions {
    pub fn validate(&self) -> Result<()> {
        if self.bundle_size == 0 {
            return Err(EndpointError::InvalidOptions(
                "bundle size must be at least 1".to_string(),
            ));
        }
        if self.retransmit_interval.is_zero() {
            return Err(EndpointError::InvalidOptions(
                "retransmit interval must be non-zero".to_string(),
            ));
        }
        if self.recv_timeout.is_zero() {
            return Err(EndpointError::InvalidOptions(
                "receive timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn policy(&self) -> RetransmitPolicy {
        RetransmitPolicy {
            interval: self.retransmit_interval,
            max_retries: self.max_retries,
        }
    }
}

/// Final statistics of a stopped sender
#[derive(Debug, Clone, Default)]
pub struct SenderReport {
    pub stats: SenderStats,
    /// Messages that were still awaiting acknowledgment at shutdown
    pub still_pending: Vec<SeqNumber>,
}

enum Command {
    /// New timers were armed
    Wake,
    Stop,
}

struct Shared {
    state: Mutex<SenderState>,
    /// Signalled whenever the pending table shrinks
    settled: Condvar,
    stopped: AtomicBool,
    transport: Arc<dyn Transport>,
    server: SocketAddr,
}

impl Shared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Reliable sending endpoint
pub struct Sender {
    shared: Arc<Shared>,
    commands: channel::Sender<Command>,
    bundle_interval: Duration,
    listener: Option<JoinHandle<()>>,
    scheduler: Option<JoinHandle<()>>,
}

impl Sender {
    /// Bind an ephemeral local socket and start sending to `server`
    pub fn connect(server: SocketAddr, options: SenderOptions) -> Result<Self> {
        options.validate()?;
        let socket = DatagramSocket::bind_for(server, options.recv_timeout)?;
        Self::start(Arc::new(socket), server, options)
    }

    /// Start a sender on an existing transport
    pub fn start(
        transport: Arc<dyn Transport>,
        server: SocketAddr,
        options: SenderOptions,
    ) -> Result<Self> {
        options.validate()?;

        let shared = Arc::new(Shared {
            state: Mutex::new(SenderState::new(options.bundle_size, options.policy())),
            settled: Condvar::new(),
            stopped: AtomicBool::new(false),
            transport,
            server,
        });
        let (commands, command_rx) = channel::unbounded();

        let listener = spawn("ack-listener", {
            let shared = shared.clone();
            move || run_ack_listener(shared)
        })?;

        let scheduler = match spawn("retransmit", {
            let shared = shared.clone();
            move || run_scheduler(shared, command_rx)
        }) {
            Ok(handle) => handle,
            Err(e) => {
                shared.stopped.store(true, Ordering::Release);
                let _ = listener.join();
                return Err(e);
            }
        };

        info!(
            "Sender started: server={}, bundle_size={}, retransmit_interval={:?}, max_retries={}",
            server, options.bundle_size, options.retransmit_interval, options.max_retries
        );

        Ok(Sender {
            shared,
            commands,
            bundle_interval: options.bundle_interval,
            listener: Some(listener),
            scheduler: Some(scheduler),
        })
    }

    pub fn server(&self) -> SocketAddr {
        self.shared.server
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.shared.transport.local_addr()?)
    }

    /// Queue a message for the next bundle
    pub fn enqueue(&self, content: impl Into<String>) -> Result<SeqNumber> {
        if self.shared.is_stopped() {
            return Err(EndpointError::Stopped);
        }
        Ok(self.shared.state.lock().enqueue(content)?)
    }

    /// Send up to one bundle of queued messages
    ///
    /// Returns the number of messages sent, zero if the queue was empty. If
    /// the transport rejects the datagram the messages stay pending and are
    /// recovered by retransmission.
    pub fn send_bundle(&self) -> Result<usize> {
        if self.shared.is_stopped() {
            return Err(EndpointError::Stopped);
        }

        let (datagram, count) = {
            let mut state = self.shared.state.lock();
            let Some(messages) = state.take_bundle() else {
                return Ok(0);
            };
            let count = messages.len();
            (state.register_bundle(messages, Instant::now())?, count)
        };

        // Timers are armed; let the scheduler pick up the new deadline
        let _ = self.commands.send(Command::Wake);

        if let Err(e) = self.shared.transport.send_to(&datagram, self.shared.server) {
            warn!("Failed to send bundle to {}: {}", self.shared.server, e);
            self.shared.state.lock().record_send_error();
            return Err(e.into());
        }

        Ok(count)
    }

    /// Send every queued message, one bundle after another
    pub fn flush(&self) -> Result<usize> {
        let mut sent = 0;
        loop {
            match self.send_bundle()? {
                0 => return Ok(sent),
                n => sent += n,
            }
        }
    }

    /// Enqueue and send a batch of messages
    ///
    /// A bundle goes out whenever enough messages are queued, followed by the
    /// configured bundle interval; the final partial bundle is sent last.
    /// If a message is rejected, the messages queued before it are still
    /// sent before the error is returned.
    pub fn send_messages<I, S>(&self, messages: I) -> Result<Vec<SeqNumber>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seqs = Vec::new();

        for content in messages {
            let seq = match self.enqueue(content) {
                Ok(seq) => seq,
                Err(e) => {
                    if let Err(flush_error) = self.flush() {
                        warn!("Failed to flush queued messages: {}", flush_error);
                    }
                    return Err(e);
                }
            };
            seqs.push(seq);

            let full = self.shared.state.lock().has_full_bundle();
            if full {
                self.send_bundle()?;
                if !self.bundle_interval.is_zero() {
                    thread::sleep(self.bundle_interval);
                }
            }
        }

        self.flush()?;
        Ok(seqs)
    }

    /// Block until no message is pending or `timeout` elapses
    ///
    /// Returns true if every sent message was acknowledged or dropped.
    pub fn wait_for_acks(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();

        while !state.pending().is_empty() {
            if self.shared.settled.wait_until(&mut state, deadline).timed_out() {
                return state.pending().is_empty();
            }
        }
        true
    }

    /// Sequence numbers awaiting acknowledgment
    pub fn pending(&self) -> Vec<SeqNumber> {
        self.shared.state.lock().pending().seqs()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> SenderStats {
        self.shared.state.lock().stats().clone()
    }

    /// Stop both background threads and cancel every retransmission timer
    pub fn stop(mut self) -> SenderReport {
        self.shutdown().unwrap_or_default()
    }

    fn shutdown(&mut self) -> Option<SenderReport> {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return None;
        }

        let _ = self.commands.send(Command::Stop);
        for handle in [self.scheduler.take(), self.listener.take()].into_iter().flatten() {
            if handle.join().is_err() {
                warn!("Sender thread panicked");
            }
        }

        let mut state = self.shared.state.lock();
        let still_pending = state.cancel_pending();
        self.shared.settled.notify_all();

        if !still_pending.is_empty() {
            info!("Stopped with {} messages pending: {:?}", still_pending.len(), still_pending);
        }

        Some(SenderReport {
            stats: state.stats().clone(),
            still_pending,
        })
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn<F>(name: &'static str, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(format!("rudp-{}", name))
        .spawn(f)
        .map_err(|source| EndpointError::Spawn { name, source })
}

fn run_ack_listener(shared: Arc<Shared>) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    while !shared.is_stopped() {
        let (n, from) = match shared.transport.recv_from(&mut buf) {
            Ok(Some(received)) => received,
            Ok(None) => continue,
            Err(e) => {
                if !shared.is_stopped() {
                    warn!("Ack listener receive error: {}", e);
                    thread::sleep(RECV_ERROR_BACKOFF);
                }
                continue;
            }
        };

        match Frame::from_bytes(&buf[..n]) {
            Ok(Frame::Ack { seq }) => {
                let outcome = shared.state.lock().on_ack(seq, Instant::now());
                if let AckOutcome::Acknowledged { .. } = outcome {
                    shared.settled.notify_all();
                }
            }
            Ok(frame) => debug!("Ignoring {} frame from {}", frame.frame_type(), from),
            Err(e) => {
                warn!("Malformed datagram from {}: {}", from, e);
                shared.state.lock().record_malformed();
            }
        }
    }

    debug!("Ack listener stopped");
}

fn run_scheduler(shared: Arc<Shared>, commands: channel::Receiver<Command>) {
    loop {
        let deadline = shared.state.lock().next_deadline();
        let wait = time::wait_until(deadline, Instant::now(), MAX_SCHEDULER_WAIT);

        match commands.recv_timeout(wait) {
            Ok(Command::Wake) => continue,
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if shared.is_stopped() {
            break;
        }

        let batch = shared.state.lock().poll_timers(Instant::now());
        if !batch.dropped.is_empty() {
            shared.settled.notify_all();
        }

        for retransmission in batch.retransmissions {
            if shared.is_stopped() {
                break;
            }
            if let Err(e) = shared
                .transport
                .send_to(&retransmission.datagram, shared.server)
            {
                warn!(
                    "Failed to retransmit seq={} (attempt {}): {}",
                    retransmission.seq, retransmission.attempt, e
                );
                shared.state.lock().record_send_error();
            }
        }
    }

    debug!("Retransmission scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rudp_io::SocketError;
    use rudp_protocol::{WireError, WireMessage, MAX_DATAGRAM_SIZE};

    /// Transport that records sent datagrams and never receives anything
    struct Blackhole {
        sent: Mutex<Vec<Vec<u8>>>,
        addr: SocketAddr,
    }

    impl Blackhole {
        fn new() -> Arc<Self> {
            Arc::new(Blackhole {
                sent: Mutex::new(Vec::new()),
                addr: "127.0.0.1:50000".parse().unwrap(),
            })
        }

        fn frames(&self) -> Vec<Frame> {
            self.sent
                .lock()
                .iter()
                .map(|bytes| Frame::from_bytes(bytes).unwrap())
                .collect()
        }
    }

    impl Transport for Blackhole {
        fn send_to(&self, buf: &[u8], _target: SocketAddr) -> std::result::Result<usize, SocketError> {
            self.sent.lock().push(buf.to_vec());
            Ok(buf.len())
        }

        fn recv_from(
            &self,
            _buf: &mut [u8],
        ) -> std::result::Result<Option<(usize, SocketAddr)>, SocketError> {
            thread::sleep(Duration::from_millis(5));
            Ok(None)
        }

        fn local_addr(&self) -> std::result::Result<SocketAddr, SocketError> {
            Ok(self.addr)
        }
    }

    fn server() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    fn options() -> SenderOptions {
        SenderOptions {
            retransmit_interval: Duration::from_millis(30),
            bundle_interval: Duration::ZERO,
            ..SenderOptions::default()
        }
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = SenderOptions {
            bundle_size: 0,
            ..SenderOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(EndpointError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_send_messages_bundles() {
        let transport = Blackhole::new();
        let sender = Sender::start(transport.clone(), server(), options()).unwrap();

        let seqs = sender
            .send_messages((1..=8).map(|i| format!("Message {}", i)))
            .unwrap();
        assert_eq!(seqs.len(), 8);

        let sizes: Vec<_> = transport
            .frames()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Bundle { messages } => Some(messages.len()),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![3, 3, 2]);
        assert_eq!(sender.pending().len(), 8);

        let report = sender.stop();
        assert_eq!(report.stats.bundles_sent, 3);
        assert_eq!(report.still_pending.len(), 8);
    }

    #[test]
    fn test_rejected_message_flushes_earlier_ones() {
        let transport = Blackhole::new();
        let options = SenderOptions {
            retransmit_interval: Duration::from_secs(5),
            ..options()
        };
        let sender = Sender::start(transport.clone(), server(), options).unwrap();

        let oversized = "x".repeat(MAX_DATAGRAM_SIZE);
        let result = sender.send_messages(["first".to_string(), oversized, "never".to_string()]);
        assert!(matches!(
            result,
            Err(EndpointError::Wire(WireError::MessageTooLarge { .. }))
        ));

        let bundles: Vec<_> = transport
            .frames()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Bundle { messages } => Some(messages),
                _ => None,
            })
            .collect();
        assert_eq!(bundles, vec![vec![WireMessage::new(SeqNumber::ZERO, "first")]]);
        assert_eq!(sender.pending(), vec![SeqNumber::ZERO]);
    }

    #[test]
    fn test_unacked_message_is_retransmitted_then_dropped() {
        let transport = Blackhole::new();
        let sender = Sender::start(transport.clone(), server(), options()).unwrap();

        sender.enqueue("lonely").unwrap();
        sender.flush().unwrap();

        assert!(sender.wait_for_acks(Duration::from_secs(2)));
        let stats = sender.stats();
        assert_eq!(stats.retransmissions, 3);
        assert_eq!(stats.messages_dropped, 1);

        let expected = WireMessage::new(SeqNumber::ZERO, "lonely");
        let singles = transport
            .frames()
            .into_iter()
            .filter(|frame| matches!(frame, Frame::Single { message } if *message == expected))
            .count();
        assert_eq!(singles, 3);
        assert!(sender.stop().still_pending.is_empty());
    }

    #[test]
    fn test_stopped_sender_rejects_work() {
        let transport = Blackhole::new();
        let mut sender = Sender::start(transport, server(), options()).unwrap();

        assert!(sender.shutdown().is_some());
        assert!(matches!(sender.enqueue("late"), Err(EndpointError::Stopped)));
        assert!(sender.shutdown().is_none());
    }
}
