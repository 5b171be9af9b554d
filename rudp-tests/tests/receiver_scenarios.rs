//! Receiver dispatch scenarios
//!
//! Drives the protocol state machines directly, with a simulated clock where
//! time matters, so every scenario is deterministic.

use rudp_protocol::{
    AckOutcome, Frame, NoLoss, ReceiverState, RetransmitPolicy, SenderState, SeqNumber,
    WireMessage,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

fn msg(seq: u64) -> WireMessage {
    WireMessage::new(SeqNumber::new(seq), format!("Message {}", seq + 1))
}

fn bundle(seqs: &[u64]) -> Vec<WireMessage> {
    seqs.iter().copied().map(msg).collect()
}

fn acks(state: &mut ReceiverState, messages: Vec<WireMessage>) -> Vec<u64> {
    state
        .handle_bundle(peer(), messages)
        .acks()
        .map(SeqNumber::as_raw)
        .collect()
}

#[test]
fn test_reordered_arrival_is_delivered_in_order() {
    let mut state = ReceiverState::new(Box::new(NoLoss), 64);

    assert!(acks(&mut state, bundle(&[2])).is_empty());
    assert_eq!(acks(&mut state, bundle(&[0])), vec![0]);
    assert_eq!(acks(&mut state, bundle(&[1])), vec![1, 2]);

    assert_eq!(state.expected(&peer()), Some(SeqNumber::new(3)));
    let stats = state.stats();
    assert_eq!(stats.messages_processed, 3);
    assert_eq!(stats.messages_buffered, 1);
}

#[test]
fn test_duplicates_are_dropped_silently() {
    let mut state = ReceiverState::new(Box::new(NoLoss), 64);

    assert_eq!(acks(&mut state, bundle(&[0, 1])), vec![0, 1]);
    assert!(acks(&mut state, bundle(&[1])).is_empty());
    assert_eq!(acks(&mut state, bundle(&[0, 1, 2])), vec![2]);

    // A duplicate of a buffered message is not buffered twice
    assert!(acks(&mut state, bundle(&[5])).is_empty());
    assert!(acks(&mut state, bundle(&[5])).is_empty());

    let stats = state.stats();
    assert_eq!(stats.duplicates_dropped, 4);
    assert_eq!(stats.messages_buffered, 1);
    assert_eq!(state.session(&peer()).unwrap().buffered(), 1);
}

#[test]
fn test_retransmission_closes_gap_and_flushes_backlog() {
    // Lose seq 1 the first time it arrives in a bundle
    let mut lost_once = false;
    let loss = move |seq: SeqNumber| {
        if seq == SeqNumber::new(1) && !lost_once {
            lost_once = true;
            return true;
        }
        false
    };
    let mut state = ReceiverState::new(Box::new(loss), 64);

    assert_eq!(acks(&mut state, bundle(&[0, 1, 2])), vec![0]);
    assert_eq!(state.expected(&peer()), Some(SeqNumber::new(1)));

    let dispatch = state.handle_single(peer(), msg(1));
    let released: Vec<_> = dispatch.delivered.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(released, vec!["Message 2", "Message 3"]);
    assert_eq!(state.expected(&peer()), Some(SeqNumber::new(3)));

    let stats = state.stats();
    assert_eq!(stats.packets_lost, 1);
    assert_eq!(stats.singles_received, 1);
    assert_eq!(stats.messages_processed, 3);
}

#[test]
fn test_messages_beyond_window_wait_for_retransmission() {
    let mut state = ReceiverState::new(Box::new(NoLoss), 4);

    assert!(acks(&mut state, bundle(&[4])).is_empty());
    assert_eq!(state.stats().out_of_window, 1);
    assert!(!state.session(&peer()).unwrap().has_seen(SeqNumber::new(4)));

    assert_eq!(acks(&mut state, bundle(&[0, 1, 2])), vec![0, 1, 2]);
    assert_eq!(acks(&mut state, bundle(&[3])), vec![3]);

    // Now inside the window
    let dispatch = state.handle_single(peer(), msg(4));
    assert_eq!(dispatch.acks().collect::<Vec<_>>(), vec![SeqNumber::new(4)]);
}

#[test]
fn test_extreme_sequence_numbers_are_out_of_window() {
    let mut state = ReceiverState::new(Box::new(NoLoss), 64);
    assert_eq!(acks(&mut state, bundle(&[0])), vec![0]);

    // Raw datagrams, as a misbehaving peer would send them
    let half = br#"{"type":"single","message":{"seq":9223372036854775808,"content":"far"}}"#;
    assert_eq!(state.handle_datagram(peer(), half).unwrap().delivered.len(), 0);

    let stranger: SocketAddr = "127.0.0.1:40001".parse().unwrap();
    let top = br#"{"type":"single","message":{"seq":18446744073709551615,"content":"top"}}"#;
    assert_eq!(state.handle_datagram(stranger, top).unwrap().delivered.len(), 0);

    let stats = state.stats();
    assert_eq!(stats.out_of_window, 2);
    assert_eq!(stats.duplicates_dropped, 0);
    assert!(!state.session(&stranger).unwrap().has_seen(SeqNumber::new(u64::MAX)));

    // The cursors are untouched
    assert_eq!(acks(&mut state, bundle(&[1])), vec![1]);
    assert_eq!(state.expected(&stranger), Some(SeqNumber::ZERO));
}

#[test]
fn test_ack_replay_is_idempotent() {
    let mut sender = SenderState::new(3, RetransmitPolicy::default());
    let t0 = Instant::now();

    for i in 0..3 {
        sender.enqueue(format!("Message {}", i + 1)).unwrap();
    }
    let messages = sender.take_bundle().unwrap();
    sender.register_bundle(messages, t0).unwrap();

    let later = t0 + Duration::from_millis(10);
    assert!(matches!(
        sender.on_ack(SeqNumber::new(1), later),
        AckOutcome::Acknowledged { .. }
    ));
    for _ in 0..3 {
        assert_eq!(sender.on_ack(SeqNumber::new(1), later), AckOutcome::Stray);
    }

    let stats = sender.stats();
    assert_eq!(stats.messages_acked, 1);
    assert_eq!(stats.stray_acks, 3);
    assert_eq!(sender.pending().seqs(), vec![SeqNumber::new(0), SeqNumber::new(2)]);
}

#[test]
fn test_lossy_exchange_recovers_every_message() {
    let policy = RetransmitPolicy {
        interval: Duration::from_secs(1),
        max_retries: 3,
    };
    let mut sender = SenderState::new(3, policy);
    let mut receiver = ReceiverState::new(
        Box::new(rudp_protocol::LossSimulator::with_seed(0.3, 7)),
        64,
    );
    let t0 = Instant::now();

    for i in 0..30 {
        sender.enqueue(format!("Message {}", i + 1)).unwrap();
    }

    let mut delivered = Vec::new();
    let mut exchange = |datagram: &[u8], sender: &mut SenderState, now: Instant| {
        let dispatch = receiver.handle_datagram(peer(), datagram).unwrap();
        for message in dispatch.delivered {
            let ack = Frame::ack(message.seq).to_bytes().unwrap();
            match Frame::from_bytes(&ack).unwrap() {
                Frame::Ack { seq } => {
                    sender.on_ack(seq, now);
                }
                other => panic!("unexpected frame {:?}", other),
            }
            delivered.push(message.seq.as_raw());
        }
    };

    while let Some(messages) = sender.take_bundle() {
        let datagram = sender.register_bundle(messages, t0).unwrap();
        exchange(&datagram[..], &mut sender, t0);
    }

    let retry_time = t0 + policy.interval;
    let batch = sender.poll_timers(retry_time);
    assert!(batch.dropped.is_empty());
    for retransmission in &batch.retransmissions {
        exchange(&retransmission.datagram[..], &mut sender, retry_time);
    }

    assert!(sender.is_drained());
    assert_eq!(delivered, (0..30).collect::<Vec<_>>());

    let stats = sender.stats();
    assert_eq!(stats.messages_acked, 30);
    assert_eq!(stats.retransmissions, receiver.stats().packets_lost);
}
