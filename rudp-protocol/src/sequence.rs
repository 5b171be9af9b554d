//! Sequence Number Handling
//!
//! Every message carries a sender-assigned sequence number. Numbers start at
//! zero, increase by one per enqueued message and are never reused for the
//! lifetime of a sender, so a plain 64-bit counter never wraps in practice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Per-sender message sequence number
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeqNumber(u64);

impl SeqNumber {
    /// The first sequence number a sender assigns and a session expects
    pub const ZERO: SeqNumber = SeqNumber(0);

    /// Create a new sequence number
    #[inline]
    pub const fn new(value: u64) -> Self {
        SeqNumber(value)
    }

    /// Get the raw sequence number value
    #[inline]
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Increment the sequence number by 1
    #[inline]
    pub fn increment(&mut self) {
        self.0 += 1;
    }

    /// Get the next sequence number
    #[inline]
    pub fn next(self) -> Self {
        SeqNumber(self.0 + 1)
    }

    /// Number of steps from this sequence number forward to `other`
    ///
    /// Returns `None` if `other` precedes `self`. Defined over the whole
    /// `u64` range.
    pub fn steps_to(self, other: SeqNumber) -> Option<u64> {
        other.0.checked_sub(self.0)
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SeqNumber {
    fn from(value: u64) -> Self {
        SeqNumber(value)
    }
}

impl From<SeqNumber> for u64 {
    fn from(seq: SeqNumber) -> u64 {
        seq.0
    }
}

impl Add<u64> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: u64) -> SeqNumber {
        SeqNumber(self.0 + rhs)
    }
}

impl AddAssign<u64> for SeqNumber {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
