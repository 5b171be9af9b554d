//! Per-endpoint receive session
//!
//! A [`Session`] owns the ordering cursor of one remote sender. Offering a
//! message yields its [`Disposition`] and appends every message that became
//! deliverable, in sequence order, to the caller's output: the offered
//! message itself when it was the expected one, followed by the contiguous
//! run of parked messages it released.

use crate::sequence::SeqNumber;
use crate::window::{ReorderWindow, Slot};
use crate::wire::WireMessage;

/// Outcome of offering one message to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// In order: delivered, and any parked backlog behind it flushed
    Accepted,
    /// Ahead of the cursor: parked until the gap closes, not acknowledged
    Buffered,
    /// Already delivered or parked
    Duplicate,
    /// Too far ahead to park, left for a later retransmission
    OutOfWindow,
}

/// Receive state for one remote endpoint
pub struct Session {
    window: ReorderWindow,
}

impl Session {
    /// Create a session whose window holds `window_capacity` sequence numbers
    pub fn new(window_capacity: usize) -> Self {
        Session {
            window: ReorderWindow::new(window_capacity),
        }
    }

    /// Next in-order sequence number
    pub fn expected(&self) -> SeqNumber {
        self.window.expected()
    }

    /// Number of messages parked ahead of the cursor
    pub fn buffered(&self) -> usize {
        self.window.parked()
    }

    /// Whether `seq` was already delivered or parked
    pub fn has_seen(&self, seq: SeqNumber) -> bool {
        self.window.contains(seq)
    }

    /// Offer one message
    ///
    /// Messages that became deliverable are appended to `released` in
    /// sequence order; each of them must be acknowledged.
    pub fn offer(&mut self, message: WireMessage, released: &mut Vec<WireMessage>) -> Disposition {
        match self.window.slot(message.seq) {
            Slot::Seen => Disposition::Duplicate,
            Slot::OutOfWindow => Disposition::OutOfWindow,
            Slot::Ahead => {
                self.window.park(message.seq, message.content);
                Disposition::Buffered
            }
            Slot::Expected => {
                self.window.advance();
                released.push(message);
                self.flush(released);
                Disposition::Accepted
            }
        }
    }

    /// Release the contiguous run of parked messages at the cursor
    fn flush(&mut self, released: &mut Vec<WireMessage>) {
        while let Some((seq, content)) = self.window.pop_expected() {
            released.push(WireMessage { seq, content });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(seq: u64) -> WireMessage {
        WireMessage::new(SeqNumber::new(seq), format!("m{}", seq))
    }

    fn seqs(released: &[WireMessage]) -> Vec<u64> {
        released.iter().map(|m| m.seq.as_raw()).collect()
    }

    #[test]
    fn test_in_order() {
        let mut session = Session::new(16);
        let mut released = Vec::new();

        for i in 0..3 {
            assert_eq!(session.offer(msg(i), &mut released), Disposition::Accepted);
        }
        assert_eq!(seqs(&released), vec![0, 1, 2]);
        assert_eq!(session.expected(), SeqNumber::new(3));
    }

    #[test]
    fn test_reorder_flush() {
        let mut session = Session::new(16);
        let mut released = Vec::new();

        assert_eq!(session.offer(msg(2), &mut released), Disposition::Buffered);
        assert!(released.is_empty());
        assert_eq!(session.buffered(), 1);

        assert_eq!(session.offer(msg(0), &mut released), Disposition::Accepted);
        assert_eq!(seqs(&released), vec![0]);

        assert_eq!(session.offer(msg(1), &mut released), Disposition::Accepted);
        assert_eq!(seqs(&released), vec![0, 1, 2]);
        assert_eq!(released[2].content, "m2");
        assert_eq!(session.expected(), SeqNumber::new(3));
        assert_eq!(session.buffered(), 0);
    }

    #[test]
    fn test_duplicates() {
        let mut session = Session::new(16);
        let mut released = Vec::new();

        session.offer(msg(0), &mut released);
        session.offer(msg(5), &mut released);

        assert_eq!(session.offer(msg(0), &mut released), Disposition::Duplicate);
        assert_eq!(session.offer(msg(5), &mut released), Disposition::Duplicate);
        assert_eq!(seqs(&released), vec![0]);
        assert_eq!(session.expected(), SeqNumber::new(1));
    }

    #[test]
    fn test_out_of_window() {
        let mut session = Session::new(4);
        let mut released = Vec::new();

        assert_eq!(session.offer(msg(4), &mut released), Disposition::OutOfWindow);
        assert!(!session.has_seen(SeqNumber::new(4)));

        for i in 0..4 {
            session.offer(msg(i), &mut released);
        }
        // The cursor moved, so the same message now fits
        assert_eq!(session.offer(msg(4), &mut released), Disposition::Accepted);
    }
}
