//! Retransmission behavior of a live sender against a silent peer

use rudp::protocol::{Frame, SeqNumber, RECV_BUFFER_SIZE};
use rudp::{Sender, SenderOptions};
use rudp_io::DatagramSocket;
use std::time::{Duration, Instant};

fn silent_peer() -> DatagramSocket {
    DatagramSocket::bind("127.0.0.1:0".parse().unwrap(), Duration::from_millis(50)).unwrap()
}

fn fast_options() -> SenderOptions {
    SenderOptions {
        retransmit_interval: Duration::from_millis(50),
        bundle_interval: Duration::ZERO,
        ..SenderOptions::default()
    }
}

/// Collect every frame the peer receives until it has been quiet for a while
fn drain(peer: &DatagramSocket, quiet: Duration) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let mut last = Instant::now();

    while last.elapsed() < quiet {
        if let Some((n, _)) = peer.recv_from(&mut buf).unwrap() {
            frames.push(Frame::from_bytes(&buf[..n]).unwrap());
            last = Instant::now();
        }
    }
    frames
}

#[test]
fn test_unacknowledged_message_dropped_after_max_retries() {
    let peer = silent_peer();
    let sender = Sender::connect(peer.local_addr().unwrap(), fast_options()).unwrap();

    sender.send_messages(["Message 1"]).unwrap();
    assert!(sender.wait_for_acks(Duration::from_secs(3)));
    assert!(sender.pending().is_empty());

    let stats = sender.stats();
    assert_eq!(stats.messages_sent, 1);
    assert_eq!(stats.retransmissions, 3);
    assert_eq!(stats.messages_dropped, 1);
    assert_eq!(stats.messages_acked, 0);

    let frames = drain(&peer, Duration::from_millis(300));
    assert!(matches!(frames[0], Frame::Bundle { .. }));
    let singles = frames
        .iter()
        .filter(|frame| matches!(frame, Frame::Single { .. }))
        .count();
    assert_eq!(singles, 3);
    assert_eq!(frames.len(), 4);

    // A late ack for the dropped message changes nothing
    let late = Frame::ack(SeqNumber::ZERO).to_bytes().unwrap();
    peer.send_to(&late, sender.local_addr().unwrap()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while sender.stats().stray_acks == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    let report = sender.stop();
    assert_eq!(report.stats.stray_acks, 1);
    assert_eq!(report.stats.messages_acked, 0);
    assert_eq!(report.stats.messages_dropped, 1);
    assert!(report.still_pending.is_empty());
}

#[test]
fn test_stray_ack_and_garbage_are_ignored() {
    let peer = silent_peer();
    let options = SenderOptions {
        retransmit_interval: Duration::from_secs(10),
        ..fast_options()
    };
    let sender = Sender::connect(peer.local_addr().unwrap(), options).unwrap();
    let sender_addr = sender.local_addr().unwrap();

    sender.send_messages(["a", "b"]).unwrap();

    let stray = Frame::ack(SeqNumber::new(99)).to_bytes().unwrap();
    peer.send_to(&stray, sender_addr).unwrap();
    peer.send_to(b"not json", sender_addr).unwrap();
    let ack = Frame::ack(SeqNumber::new(0)).to_bytes().unwrap();
    peer.send_to(&ack, sender_addr).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while sender.stats().messages_acked < 1 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(sender.pending(), vec![SeqNumber::new(1)]);
    let report = sender.stop();
    assert_eq!(report.stats.stray_acks, 1);
    assert_eq!(report.stats.malformed_packets, 1);
    assert_eq!(report.still_pending, vec![SeqNumber::new(1)]);
}

#[test]
fn test_stop_reports_pending_and_silences_timers() {
    let peer = silent_peer();
    let sender = Sender::connect(peer.local_addr().unwrap(), fast_options()).unwrap();

    sender.send_messages(["x", "y", "z"]).unwrap();
    let report = sender.stop();
    assert_eq!(
        report.still_pending,
        vec![SeqNumber::new(0), SeqNumber::new(1), SeqNumber::new(2)]
    );

    // The bundle arrives, but no retransmission follows the shutdown
    let frames = drain(&peer, Duration::from_millis(200));
    assert_eq!(frames.len(), 1);
}
