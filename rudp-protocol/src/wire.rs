//! Wire Format and Serialization
//!
//! Every datagram carries exactly one JSON-encoded [`Frame`], tagged by its
//! `type` field:
//!
//! | Frame    | Payload                                               |
//! |----------|-------------------------------------------------------|
//! | `bundle` | `{"type":"bundle","messages":[{"seq":0,"content":"a"}]}` |
//! | `single` | `{"type":"single","message":{"seq":0,"content":"a"}}`  |
//! | `ack`    | `{"type":"ack","seq":0}`                              |
//!
//! Bundles carry first transmissions, singles carry retransmissions, and
//! acks flow back from the receiver, one per accepted message.

use crate::sequence::SeqNumber;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Largest payload a single UDP datagram can carry over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Receive buffer size, large enough for any datagram
pub const RECV_BUFFER_SIZE: usize = 65_535;

/// Bytes taken by `{"type":"bundle","messages":[]}` around the messages
const BUNDLE_OVERHEAD: usize = 31;

/// Wire format errors
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Malformed datagram: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Encoded frame is {size} bytes, datagram limit is {limit}")]
    Oversized { size: usize, limit: usize },

    #[error("Message {seq} encodes to {size} bytes, per-message limit is {limit}")]
    MessageTooLarge {
        seq: SeqNumber,
        size: usize,
        limit: usize,
    },

    #[error("Bundle of {count} messages exceeds bundle size {max}")]
    BundleTooLarge { count: usize, max: usize },

    #[error("Bundle contains no messages")]
    EmptyBundle,
}

/// One application message as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub seq: SeqNumber,
    pub content: String,
}

impl WireMessage {
    pub fn new(seq: SeqNumber, content: impl Into<String>) -> Self {
        WireMessage {
            seq,
            content: content.into(),
        }
    }

    /// Number of bytes this message occupies inside an encoded frame
    pub fn encoded_len(&self) -> Result<usize, WireError> {
        let mut counter = ByteCounter(0);
        serde_json::to_writer(&mut counter, self).map_err(WireError::Encode)?;
        Ok(counter.0)
    }
}

/// Frame kinds, used for logging and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Bundle,
    Single,
    Ack,
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameType::Bundle => "bundle",
            FrameType::Single => "single",
            FrameType::Ack => "ack",
        };
        f.write_str(name)
    }
}

/// A datagram payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// A batch of first transmissions
    Bundle { messages: Vec<WireMessage> },
    /// A retransmission of one message
    Single { message: WireMessage },
    /// Acknowledgment of one accepted message
    Ack { seq: SeqNumber },
}

impl Frame {
    /// Build a bundle frame, checking it against the configured bundle size
    pub fn bundle(messages: Vec<WireMessage>, bundle_size: usize) -> Result<Self, WireError> {
        if messages.is_empty() {
            return Err(WireError::EmptyBundle);
        }
        if messages.len() > bundle_size {
            return Err(WireError::BundleTooLarge {
                count: messages.len(),
                max: bundle_size,
            });
        }
        Ok(Frame::Bundle { messages })
    }

    pub fn single(message: WireMessage) -> Self {
        Frame::Single { message }
    }

    pub fn ack(seq: SeqNumber) -> Self {
        Frame::Ack { seq }
    }

    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Bundle { .. } => FrameType::Bundle,
            Frame::Single { .. } => FrameType::Single,
            Frame::Ack { .. } => FrameType::Ack,
        }
    }

    /// Serialize the frame into a datagram payload
    pub fn to_bytes(&self) -> Result<Bytes, WireError> {
        let encoded = serde_json::to_vec(self).map_err(WireError::Encode)?;
        if encoded.len() > MAX_DATAGRAM_SIZE {
            return Err(WireError::Oversized {
                size: encoded.len(),
                limit: MAX_DATAGRAM_SIZE,
            });
        }
        Ok(Bytes::from(encoded))
    }

    /// Parse a datagram payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(bytes).map_err(WireError::Malformed)
    }
}

/// Largest encoded message that still lets a full bundle fit in one datagram
pub fn max_message_len(bundle_size: usize) -> usize {
    let bundle_size = bundle_size.max(1);
    let separators = bundle_size - 1;
    (MAX_DATAGRAM_SIZE - BUNDLE_OVERHEAD - separators) / bundle_size
}

/// Check that a message fits the per-message budget for `bundle_size`
pub fn check_message_len(message: &WireMessage, bundle_size: usize) -> Result<(), WireError> {
    let size = message.encoded_len()?;
    let limit = max_message_len(bundle_size);
    if size > limit {
        return Err(WireError::MessageTooLarge {
            seq: message.seq,
            size,
            limit,
        });
    }
    Ok(())
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
