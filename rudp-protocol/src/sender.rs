//! Sender protocol state
//!
//! [`SenderState`] assigns sequence numbers, queues messages for bundling,
//! and owns the pending table together with the sender statistics. Callers
//! keep it behind one lock and never hold that lock across a network call:
//! [`SenderState::register_bundle`] and [`SenderState::poll_timers`] hand back
//! encoded datagrams that the caller sends after releasing the lock.
//!
//! Bundle entries are registered before their datagram exists on the wire,
//! so an acknowledgment can never race ahead of its pending entry.

use crate::pending::{PendingTable, RetransmitPolicy, TimerAction};
use crate::sequence::SeqNumber;
use crate::stats::SenderStats;
use crate::wire::{self, Frame, WireError, WireMessage};
use bytes::Bytes;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default number of messages per bundle
pub const DEFAULT_BUNDLE_SIZE: usize = 3;

/// Result of processing one acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The message was pending and is now retired
    Acknowledged { rtt: Duration },
    /// Nothing was pending under this sequence number
    Stray,
}

/// A retransmission ready to hand to the transport
#[derive(Debug, Clone)]
pub struct Retransmission {
    pub seq: SeqNumber,
    pub attempt: u32,
    pub datagram: Bytes,
}

/// Work produced by firing due timers
#[derive(Debug, Clone, Default)]
pub struct TimerBatch {
    pub retransmissions: Vec<Retransmission>,
    pub dropped: Vec<SeqNumber>,
}

impl TimerBatch {
    pub fn is_empty(&self) -> bool {
        self.retransmissions.is_empty() && self.dropped.is_empty()
    }
}

/// Send-side protocol state
pub struct SenderState {
    next_seq: SeqNumber,
    queue: VecDeque<WireMessage>,
    pending: PendingTable,
    stats: SenderStats,
    bundle_size: usize,
}

impl SenderState {
    /// # Panics
    /// Panics if `bundle_size` is zero
    pub fn new(bundle_size: usize, policy: RetransmitPolicy) -> Self {
        assert!(bundle_size > 0, "Bundle size must be at least 1");
        SenderState {
            next_seq: SeqNumber::ZERO,
            queue: VecDeque::new(),
            pending: PendingTable::new(policy),
            stats: SenderStats::default(),
            bundle_size,
        }
    }

    pub fn bundle_size(&self) -> usize {
        self.bundle_size
    }

    /// Assign the next sequence number and queue the message for bundling
    ///
    /// Fails without consuming a sequence number if the message is too large
    /// for a full bundle to fit in one datagram.
    pub fn enqueue(&mut self, content: impl Into<String>) -> Result<SeqNumber, WireError> {
        let message = WireMessage::new(self.next_seq, content);
        wire::check_message_len(&message, self.bundle_size)?;

        let seq = message.seq;
        self.next_seq.increment();
        self.queue.push_back(message);
        self.stats.messages_enqueued += 1;
        Ok(seq)
    }

    /// Number of messages waiting for a bundle
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn has_full_bundle(&self) -> bool {
        self.queue.len() >= self.bundle_size
    }

    /// Take up to one bundle's worth of queued messages, oldest first
    pub fn take_bundle(&mut self) -> Option<Vec<WireMessage>> {
        if self.queue.is_empty() {
            return None;
        }
        let n = self.queue.len().min(self.bundle_size);
        Some(self.queue.drain(..n).collect())
    }

    /// Encode a bundle and register its messages as pending at `now`
    ///
    /// On error no message becomes pending and all of them count as dropped.
    pub fn register_bundle(
        &mut self,
        messages: Vec<WireMessage>,
        now: Instant,
    ) -> Result<Bytes, WireError> {
        let count = messages.len() as u64;
        let encoded = Frame::bundle(messages, self.bundle_size)
            .and_then(|frame| frame.to_bytes().map(|bytes| (frame, bytes)));

        let (frame, datagram) = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                self.stats.messages_dropped += count;
                return Err(e);
            }
        };

        if let Frame::Bundle { messages } = frame {
            let seqs: Vec<_> = messages.iter().map(|m| m.seq).collect();
            for message in messages {
                self.pending.insert(message, now);
            }
            info!("SENT bundle: {} messages (seq: {:?})", seqs.len(), seqs);
        }

        self.stats.bundles_sent += 1;
        self.stats.messages_sent += count;
        Ok(datagram)
    }

    /// Retire a pending message on acknowledgment
    pub fn on_ack(&mut self, seq: SeqNumber, now: Instant) -> AckOutcome {
        match self.pending.acknowledge(seq, now) {
            Some(rtt) => {
                self.stats.messages_acked += 1;
                self.stats.rtt.record(rtt);
                debug!("ACK seq={} (RTT: {:?})", seq, rtt);
                AckOutcome::Acknowledged { rtt }
            }
            None => {
                self.stats.stray_acks += 1;
                debug!("Ignoring ack for seq={}, not pending", seq);
                AckOutcome::Stray
            }
        }
    }

    /// Fire due retransmission timers
    pub fn poll_timers(&mut self, now: Instant) -> TimerBatch {
        let mut batch = TimerBatch::default();

        for action in self.pending.fire_due(now) {
            match action {
                TimerAction::Resend { message, attempt } => {
                    let seq = message.seq;
                    match Frame::single(message).to_bytes() {
                        Ok(datagram) => {
                            self.stats.retransmissions += 1;
                            info!("RETRANSMIT seq={} (attempt {})", seq, attempt);
                            batch.retransmissions.push(Retransmission {
                                seq,
                                attempt,
                                datagram,
                            });
                        }
                        Err(e) => warn!("Failed to encode retransmission of seq={}: {}", seq, e),
                    }
                }
                TimerAction::Drop { seq, retries } => {
                    self.stats.messages_dropped += 1;
                    warn!("DROP seq={} after {} retries", seq, retries);
                    batch.dropped.push(seq);
                }
            }
        }

        batch
    }

    /// Earliest pending retransmission deadline
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    /// Nothing queued and nothing awaiting acknowledgment
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.pending.is_empty()
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    /// Cancel every timer; returns the messages still pending
    pub fn cancel_pending(&mut self) -> Vec<SeqNumber> {
        self.pending.cancel_all()
    }

    pub fn record_malformed(&mut self) {
        self.stats.malformed_packets += 1;
    }

    pub fn record_send_error(&mut self) {
        self.stats.send_errors += 1;
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }
}
