//! RUDP Protocol Core Implementation
//!
//! This crate implements the I/O-free core of the bundled reliable-delivery
//! protocol: sequence numbers, the JSON wire format, the per-endpoint reorder
//! window and receive session, receiver dispatch with simulated loss, and the
//! sender's pending table with its retransmission state machine.

pub mod loss;
pub mod pending;
pub mod receiver;
pub mod rtt;
pub mod sender;
pub mod sequence;
pub mod session;
pub mod stats;
pub mod window;
pub mod wire;

pub use loss::{LossModel, LossSimulator, NoLoss, DEFAULT_LOSS_PROBABILITY};
pub use pending::{PendingMessage, PendingTable, RetransmitPolicy, TimerAction};
pub use receiver::{Dispatch, ReceiverState, DEFAULT_WINDOW_CAPACITY};
pub use rtt::RttStats;
pub use sender::{AckOutcome, Retransmission, SenderState, TimerBatch, DEFAULT_BUNDLE_SIZE};
pub use sequence::SeqNumber;
pub use session::{Disposition, Session};
pub use stats::{ReceiverStats, SenderStats};
pub use window::{ReorderWindow, Slot};
pub use wire::{Frame, FrameType, WireError, WireMessage, MAX_DATAGRAM_SIZE, RECV_BUFFER_SIZE};
