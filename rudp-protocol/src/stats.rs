//! Sender and receiver statistics
//!
//! Both aggregates are owned by the state they describe and mutated under the
//! same lock, so a clone is a consistent snapshot.

use crate::rtt::RttStats;
use std::time::Duration;

/// Sender statistics
#[derive(Debug, Clone, Default)]
pub struct SenderStats {
    /// Messages handed over by the application
    pub messages_enqueued: u64,
    /// Messages transmitted for the first time
    pub messages_sent: u64,
    /// Messages acknowledged
    pub messages_acked: u64,
    /// Single-message retransmissions
    pub retransmissions: u64,
    /// Messages dropped after exhausting their retry budget
    pub messages_dropped: u64,
    /// Bundles transmitted
    pub bundles_sent: u64,
    /// Acks for messages that were not pending
    pub stray_acks: u64,
    /// Inbound datagrams that failed to decode
    pub malformed_packets: u64,
    /// Transport errors while sending
    pub send_errors: u64,
    /// Round-trip time samples
    pub rtt: RttStats,
}

impl SenderStats {
    /// Percentage of sent messages that were acknowledged
    pub fn success_rate(&self) -> Option<f64> {
        if self.messages_sent == 0 {
            return None;
        }
        Some(self.messages_acked as f64 / self.messages_sent as f64 * 100.0)
    }

    pub fn average_rtt(&self) -> Option<Duration> {
        self.rtt.average()
    }
}

/// Receiver statistics
#[derive(Debug, Clone, Default)]
pub struct ReceiverStats {
    /// Datagrams received
    pub total_packets: u64,
    /// Bundle frames received
    pub bundles_received: u64,
    /// Single-message frames received
    pub singles_received: u64,
    /// Messages delivered in order
    pub messages_processed: u64,
    /// Messages parked ahead of the cursor
    pub messages_buffered: u64,
    /// Messages already seen
    pub duplicates_dropped: u64,
    /// Messages too far ahead of the cursor to park
    pub out_of_window: u64,
    /// Messages discarded by the loss simulator
    pub packets_lost: u64,
    /// Acks handed to the transport
    pub acks_sent: u64,
    /// Acks the transport failed to send
    pub ack_send_errors: u64,
    /// Datagrams that failed to decode
    pub malformed_packets: u64,
    /// Frames a receiver does not handle (acks)
    pub unexpected_frames: u64,
    /// Remote endpoints with a session
    pub active_clients: usize,
}
