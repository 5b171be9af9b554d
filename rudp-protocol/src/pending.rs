//! Pending-message table and retransmission timers
//!
//! Every transmitted message stays in the [`PendingTable`] until it is
//! acknowledged or its retry budget runs out. Each entry walks a small state
//! machine driven by its timer:
//!
//! ```text
//! Pending(0) --fire--> Pending(1) --fire--> ... Pending(max) --fire--> Dropped
//!      \__________________ ack _____________________/
//!                           v
//!                      Acknowledged
//! ```
//!
//! Timers live in one deadline queue instead of one thread per message, so
//! the owner polls [`PendingTable::fire_due`] from a single scheduler and can
//! cancel everything at once with [`PendingTable::cancel_all`]. All methods
//! take the current time as an argument so the table itself never reads a
//! clock.

use crate::sequence::SeqNumber;
use crate::wire::WireMessage;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::time::{Duration, Instant};

/// Default time between transmissions of an unacknowledged message
pub const DEFAULT_RETRANSMIT_INTERVAL: Duration = Duration::from_secs(1);

/// Default retransmissions before a message is dropped
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Retransmission policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitPolicy {
    /// Time between transmissions of an unacknowledged message
    pub interval: Duration,
    /// Retransmissions attempted before the message is dropped
    pub max_retries: u32,
}

impl Default for RetransmitPolicy {
    fn default() -> Self {
        RetransmitPolicy {
            interval: DEFAULT_RETRANSMIT_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// A transmitted, not yet acknowledged message
#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub message: WireMessage,
    /// Time of the first transmission
    pub first_sent: Instant,
    /// Time of the most recent transmission
    pub last_sent: Instant,
    /// Retransmissions so far
    pub retries: u32,
    /// When the timer fires next
    deadline: Instant,
}

impl PendingMessage {
    pub fn seq(&self) -> SeqNumber {
        self.message.seq
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// What a fired timer asks the owner to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    /// Send the message again, as a single; `attempt` counts from 1
    Resend { message: WireMessage, attempt: u32 },
    /// Retry budget exhausted, the message left the table
    Drop { seq: SeqNumber, retries: u32 },
}

/// Table of in-flight messages keyed by sequence number
pub struct PendingTable {
    entries: BTreeMap<SeqNumber, PendingMessage>,
    /// Min-heap of (deadline, seq); may hold stale timers of retired entries
    timers: BinaryHeap<Reverse<(Instant, SeqNumber)>>,
    policy: RetransmitPolicy,
}

impl PendingTable {
    pub fn new(policy: RetransmitPolicy) -> Self {
        PendingTable {
            entries: BTreeMap::new(),
            timers: BinaryHeap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> RetransmitPolicy {
        self.policy
    }

    /// Register a message transmitted at `now` and arm its timer
    ///
    /// Re-registering a sequence number that is still pending replaces the
    /// entry and restarts its retry budget.
    pub fn insert(&mut self, message: WireMessage, now: Instant) {
        let seq = message.seq;
        let deadline = now + self.policy.interval;

        self.entries.insert(
            seq,
            PendingMessage {
                message,
                first_sent: now,
                last_sent: now,
                retries: 0,
                deadline,
            },
        );
        self.timers.push(Reverse((deadline, seq)));
    }

    /// Retire a message on acknowledgment
    ///
    /// Returns the round-trip time measured from the most recent
    /// transmission, or `None` if the message is not pending (already
    /// acknowledged, dropped, or never sent).
    pub fn acknowledge(&mut self, seq: SeqNumber, now: Instant) -> Option<Duration> {
        let entry = self.entries.remove(&seq)?;
        Some(now.saturating_duration_since(entry.last_sent))
    }

    /// Fire every timer due at `now`
    pub fn fire_due(&mut self, now: Instant) -> Vec<TimerAction> {
        let mut actions = Vec::new();

        while let Some(&Reverse((deadline, seq))) = self.timers.peek() {
            if deadline > now {
                break;
            }
            self.timers.pop();

            let Some(entry) = self.entries.get_mut(&seq) else {
                continue;
            };
            if entry.deadline != deadline {
                continue;
            }

            if entry.retries >= self.policy.max_retries {
                let retries = entry.retries;
                self.entries.remove(&seq);
                actions.push(TimerAction::Drop { seq, retries });
                continue;
            }

            entry.retries += 1;
            entry.last_sent = now;
            entry.deadline = now + self.policy.interval;
            self.timers.push(Reverse((entry.deadline, seq)));

            actions.push(TimerAction::Resend {
                message: entry.message.clone(),
                attempt: entry.retries,
            });
        }

        actions
    }

    /// Earliest live deadline, discarding stale timers on the way
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(&Reverse((deadline, seq))) = self.timers.peek() {
            match self.entries.get(&seq) {
                Some(entry) if entry.deadline == deadline => return Some(deadline),
                _ => {
                    self.timers.pop();
                }
            }
        }
        None
    }

    /// Remove every entry and timer, returning the sequence numbers that were
    /// still pending
    pub fn cancel_all(&mut self) -> Vec<SeqNumber> {
        self.timers.clear();
        let seqs = self.entries.keys().copied().collect();
        self.entries.clear();
        seqs
    }

    pub fn get(&self, seq: SeqNumber) -> Option<&PendingMessage> {
        self.entries.get(&seq)
    }

    pub fn contains(&self, seq: SeqNumber) -> bool {
        self.entries.contains_key(&seq)
    }

    /// Pending sequence numbers in ascending order
    pub fn seqs(&self) -> Vec<SeqNumber> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
