//! RUDP - Reliable delivery over UDP
//!
//! Threaded sender and receiver endpoints for the bundled reliable-delivery
//! protocol. The sender batches messages into bundles, retransmits each
//! unacknowledged message on its own, and gives up after a bounded number of
//! retries. The receiver acknowledges every message it delivers and releases
//! messages to the application strictly in sequence order per remote
//! endpoint.
//!
//! ```no_run
//! use rudp::{Receiver, ReceiverOptions, Sender, SenderOptions};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), rudp::EndpointError> {
//! let receiver = Receiver::bind("127.0.0.1:9999".parse().unwrap(), ReceiverOptions::default())?;
//! let sender = Sender::connect(receiver.local_addr()?, SenderOptions::default())?;
//!
//! sender.send_messages(["Message 1", "Message 2", "Message 3"])?;
//! sender.wait_for_acks(Duration::from_secs(5));
//!
//! let report = sender.stop();
//! println!("acked {}", report.stats.messages_acked);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod receiver;
pub mod sender;

pub use rudp_io as io;
pub use rudp_protocol as protocol;

pub use error::EndpointError;
pub use receiver::{Delivery, Receiver, ReceiverOptions};
pub use sender::{Sender, SenderOptions, SenderReport};

// Re-export commonly used types
pub use protocol::{Frame, ReceiverStats, SenderStats, SeqNumber, WireMessage};
