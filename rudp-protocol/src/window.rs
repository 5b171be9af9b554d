//! Bounded reorder window for one remote endpoint
//!
//! The window remembers everything the receiver has seen from a sender
//! without growing forever. Every sequence number below the `expected`
//! cursor has been delivered and is implicitly seen. Messages that arrive
//! ahead of the cursor are parked in a circular buffer indexed by sequence
//! number until the gap in front of them closes. Anything at or beyond
//! `expected + capacity` does not fit and has to be retransmitted later.

use crate::sequence::SeqNumber;

/// Where a sequence number falls relative to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Already delivered or already parked
    Seen,
    /// Exactly the next in-order sequence number
    Expected,
    /// Ahead of the cursor, free to park
    Ahead,
    /// Too far ahead to park
    OutOfWindow,
}

/// Circular reorder buffer
pub struct ReorderWindow {
    /// Parked content, indexed by `seq & mask`
    slots: Vec<Option<String>>,
    /// Mask for fast modulo operation (capacity - 1)
    mask: usize,
    /// Next in-order sequence number
    expected: SeqNumber,
    /// Number of parked messages
    parked: usize,
}

impl ReorderWindow {
    /// Create a window holding up to `capacity` sequence numbers ahead of the
    /// cursor (rounded up to a power of 2)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();

        ReorderWindow {
            slots: vec![None; capacity],
            mask: capacity - 1,
            expected: SeqNumber::ZERO,
            parked: 0,
        }
    }

    #[inline]
    fn index(&self, seq: SeqNumber) -> usize {
        (seq.as_raw() as usize) & self.mask
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Next in-order sequence number
    pub fn expected(&self) -> SeqNumber {
        self.expected
    }

    /// Number of messages parked ahead of the cursor
    pub fn parked(&self) -> usize {
        self.parked
    }

    /// Classify a sequence number against the current cursor
    pub fn slot(&self, seq: SeqNumber) -> Slot {
        match self.expected.steps_to(seq) {
            None => Slot::Seen,
            Some(0) => Slot::Expected,
            Some(steps) if steps >= self.capacity() as u64 => Slot::OutOfWindow,
            Some(_) if self.slots[self.index(seq)].is_some() => Slot::Seen,
            Some(_) => Slot::Ahead,
        }
    }

    /// Whether `seq` has been delivered or parked
    pub fn contains(&self, seq: SeqNumber) -> bool {
        self.slot(seq) == Slot::Seen
    }

    /// Park a message ahead of the cursor
    ///
    /// Returns false if the slot is not free (see [`ReorderWindow::slot`]).
    pub fn park(&mut self, seq: SeqNumber, content: String) -> bool {
        if self.slot(seq) != Slot::Ahead {
            return false;
        }
        let idx = self.index(seq);
        self.slots[idx] = Some(content);
        self.parked += 1;
        true
    }

    /// Move the cursor past the expected sequence number
    ///
    /// Used when the expected message arrives directly and is delivered
    /// without being parked.
    pub fn advance(&mut self) -> SeqNumber {
        let seq = self.expected;
        debug_assert!(self.slots[self.index(seq)].is_none());
        self.expected.increment();
        seq
    }

    /// Take the parked message at the cursor, if any, and advance past it
    pub fn pop_expected(&mut self) -> Option<(SeqNumber, String)> {
        let seq = self.expected;
        let idx = self.index(seq);
        let content = self.slots[idx].take()?;
        self.parked -= 1;
        self.expected.increment();
        Some((seq, content))
    }
}
