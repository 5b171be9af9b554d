//! Receiver dispatch
//!
//! [`ReceiverState`] turns inbound frames into deliveries and the
//! acknowledgments that must be sent for them. It performs no I/O: the caller
//! decodes nothing, sends nothing, and only forwards datagrams in and acks
//! out.
//!
//! Bundled messages first pass the loss model, then go to the session of the
//! sending endpoint. Single-message retransmissions skip the loss model but
//! otherwise take the same path, so a retransmission that closes a gap
//! flushes the backlog behind it just like a bundled message would.

use crate::loss::LossModel;
use crate::sequence::SeqNumber;
use crate::session::{Disposition, Session};
use crate::stats::ReceiverStats;
use crate::wire::{Frame, WireError, WireMessage};
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{debug, trace, warn};

/// Default reorder window capacity per endpoint
pub const DEFAULT_WINDOW_CAPACITY: usize = 4096;

/// Messages released by one frame, in delivery order
///
/// Every released message must be acknowledged, in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub delivered: Vec<WireMessage>,
}

impl Dispatch {
    /// Sequence numbers to acknowledge, in order
    pub fn acks(&self) -> impl Iterator<Item = SeqNumber> + '_ {
        self.delivered.iter().map(|m| m.seq)
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
    }
}

/// Receive-side protocol state for all endpoints
pub struct ReceiverState {
    sessions: HashMap<SocketAddr, Session>,
    loss: Box<dyn LossModel>,
    window_capacity: usize,
    stats: ReceiverStats,
}

impl ReceiverState {
    pub fn new(loss: Box<dyn LossModel>, window_capacity: usize) -> Self {
        ReceiverState {
            sessions: HashMap::new(),
            loss,
            window_capacity,
            stats: ReceiverStats::default(),
        }
    }

    /// Decode one datagram and dispatch the frame it carries
    pub fn handle_datagram(&mut self, from: SocketAddr, bytes: &[u8]) -> Result<Dispatch, WireError> {
        self.stats.total_packets += 1;

        let frame = match Frame::from_bytes(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.malformed_packets += 1;
                return Err(e);
            }
        };

        Ok(self.handle_frame(from, frame))
    }

    pub fn handle_frame(&mut self, from: SocketAddr, frame: Frame) -> Dispatch {
        match frame {
            Frame::Bundle { messages } => self.handle_bundle(from, messages),
            Frame::Single { message } => self.handle_single(from, message),
            Frame::Ack { seq } => {
                warn!("Unexpected ack seq={} from {}", seq, from);
                self.stats.unexpected_frames += 1;
                Dispatch::default()
            }
        }
    }

    /// Process a bundle, message by message in bundle order
    pub fn handle_bundle(&mut self, from: SocketAddr, messages: Vec<WireMessage>) -> Dispatch {
        self.stats.bundles_received += 1;
        debug!("Bundle from {}: {} messages", from, messages.len());

        let mut dispatch = Dispatch::default();
        for message in messages {
            if self.loss.should_drop(message.seq) {
                debug!("LOST seq={} from {}", message.seq, from);
                self.stats.packets_lost += 1;
                continue;
            }
            self.offer(from, message, &mut dispatch);
        }
        dispatch
    }

    /// Process a single-message retransmission
    pub fn handle_single(&mut self, from: SocketAddr, message: WireMessage) -> Dispatch {
        self.stats.singles_received += 1;
        debug!("Retransmitted seq={} from {}", message.seq, from);

        let mut dispatch = Dispatch::default();
        self.offer(from, message, &mut dispatch);
        dispatch
    }

    fn offer(&mut self, from: SocketAddr, message: WireMessage, dispatch: &mut Dispatch) {
        let window_capacity = self.window_capacity;
        let session = self
            .sessions
            .entry(from)
            .or_insert_with(|| {
                debug!("New session for {}", from);
                Session::new(window_capacity)
            });

        let seq = message.seq;
        let first_released = dispatch.delivered.len();

        match session.offer(message, &mut dispatch.delivered) {
            Disposition::Accepted => {
                let released = &dispatch.delivered[first_released..];
                for delivered in released {
                    trace!("PROCESS seq={} from {}: {}", delivered.seq, from, delivered.content);
                }
                if released.len() > 1 {
                    debug!(
                        "seq={} from {} released {} buffered messages",
                        seq,
                        from,
                        released.len() - 1
                    );
                }
                self.stats.messages_processed += released.len() as u64;
            }
            Disposition::Buffered => {
                debug!("BUFFER seq={} from {} (waiting {})", seq, from, session.expected());
                self.stats.messages_buffered += 1;
            }
            Disposition::Duplicate => {
                debug!("DUPLICATE seq={} from {}", seq, from);
                self.stats.duplicates_dropped += 1;
            }
            Disposition::OutOfWindow => {
                debug!(
                    "seq={} from {} beyond reorder window (expected {})",
                    seq,
                    from,
                    session.expected()
                );
                self.stats.out_of_window += 1;
            }
        }
    }

    /// Record the outcome of handing an ack to the transport
    pub fn record_ack(&mut self, sent: bool) {
        if sent {
            self.stats.acks_sent += 1;
        } else {
            self.stats.ack_send_errors += 1;
        }
    }

    pub fn session(&self, addr: &SocketAddr) -> Option<&Session> {
        self.sessions.get(addr)
    }

    /// Expected cursor of an endpoint, if it has a session
    pub fn expected(&self, addr: &SocketAddr) -> Option<SeqNumber> {
        self.sessions.get(addr).map(Session::expected)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            active_clients: self.sessions.len(),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::NoLoss;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn msg(seq: u64) -> WireMessage {
        WireMessage::new(SeqNumber::new(seq), format!("m{}", seq))
    }

    fn acks(dispatch: &Dispatch) -> Vec<u64> {
        dispatch.acks().map(SeqNumber::as_raw).collect()
    }

    #[test]
    fn test_bundle_in_order() {
        let mut state = ReceiverState::new(Box::new(NoLoss), 64);
        let dispatch = state.handle_bundle(peer(), vec![msg(0), msg(1), msg(2)]);

        assert_eq!(acks(&dispatch), vec![0, 1, 2]);
        assert_eq!(state.expected(&peer()), Some(SeqNumber::new(3)));
        assert_eq!(state.stats().messages_processed, 3);
        assert_eq!(state.stats().bundles_received, 1);
    }

    #[test]
    fn test_sessions_are_independent() {
        let other: SocketAddr = "127.0.0.1:40001".parse().unwrap();
        let mut state = ReceiverState::new(Box::new(NoLoss), 64);

        state.handle_bundle(peer(), vec![msg(0), msg(1)]);
        let dispatch = state.handle_bundle(other, vec![msg(1)]);

        assert!(dispatch.is_empty());
        assert_eq!(state.expected(&peer()), Some(SeqNumber::new(2)));
        assert_eq!(state.expected(&other), Some(SeqNumber::ZERO));
        assert_eq!(state.stats().active_clients, 2);
    }

    #[test]
    fn test_single_from_new_endpoint_opens_session() {
        let mut state = ReceiverState::new(Box::new(NoLoss), 64);
        let dispatch = state.handle_single(peer(), msg(0));

        assert_eq!(acks(&dispatch), vec![0]);
        assert_eq!(state.stats().singles_received, 1);
    }

    #[test]
    fn test_loss_model_skipped_for_singles() {
        let mut state = ReceiverState::new(Box::new(|_seq: SeqNumber| true), 64);

        let dispatch = state.handle_bundle(peer(), vec![msg(0)]);
        assert!(dispatch.is_empty());
        assert_eq!(state.stats().packets_lost, 1);
        // The bundle never reached a session
        assert!(state.session(&peer()).is_none());

        let dispatch = state.handle_single(peer(), msg(0));
        assert_eq!(acks(&dispatch), vec![0]);
    }

    #[test]
    fn test_datagram_decoding() {
        let mut state = ReceiverState::new(Box::new(NoLoss), 64);

        assert!(state.handle_datagram(peer(), b"{garbage").is_err());

        let bytes = Frame::single(msg(0)).to_bytes().unwrap();
        let dispatch = state.handle_datagram(peer(), &bytes).unwrap();
        assert_eq!(acks(&dispatch), vec![0]);

        let ack = Frame::ack(SeqNumber::new(0)).to_bytes().unwrap();
        assert!(state.handle_datagram(peer(), &ack).unwrap().is_empty());

        let stats = state.stats();
        assert_eq!(stats.total_packets, 3);
        assert_eq!(stats.malformed_packets, 1);
        assert_eq!(stats.unexpected_frames, 1);
    }

    #[test]
    fn test_record_ack() {
        let mut state = ReceiverState::new(Box::new(NoLoss), 64);
        state.record_ack(true);
        state.record_ack(true);
        state.record_ack(false);

        assert_eq!(state.stats().acks_sent, 2);
        assert_eq!(state.stats().ack_send_errors, 1);
    }
}
