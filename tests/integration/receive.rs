use crate::*;

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use bytes::Bytes;
use sluice_media::{Channel, Direction, MediaDescription};

fn audio_link(a: Direction, b: Direction, recv_queue_limit: usize) -> Link {
    init_tracing();
    let config = TrackConfig {
        recv_queue_limit,
        ..TrackConfig::default()
    };
    link(
        MediaDescription::audio("audio0", a),
        MediaDescription::audio("audio0", b),
        &config,
    )
}

/// A full receive queue drops the newest arrivals and keeps the oldest.
#[test]
fn test_full_queue_drops_newest() -> Result<()> {
    let link = audio_link(Direction::SendRecv, Direction::SendRecv, 4);

    for i in 0..6u8 {
        assert!(link.a.send_binary(Bytes::from(vec![i]))?);
    }

    assert_eq!(link.b.available_amount(), 4);
    assert_eq!(link.counters.snapshot().queue_full, 2);

    let payloads: Vec<u8> = drain(&link.b).iter().map(|m| m.payload[0]).collect();
    assert_eq!(payloads, vec![0, 1, 2, 3]);
    assert_eq!(link.b.available_amount(), 0);
    assert!(link.b.receive().is_none());
    Ok(())
}

/// Peek shows the head without consuming it.
#[test]
fn test_peek_then_receive_same_thread() -> Result<()> {
    let link = audio_link(Direction::SendRecv, Direction::SendRecv, 8);
    link.a.send_binary(Bytes::from_static(b"first"))?;
    link.a.send_binary(Bytes::from_static(b"second"))?;

    let peeked = link.b.peek().expect("queue has two messages");
    assert_eq!(link.b.receive(), Some(peeked));
    assert_eq!(&link.b.receive().expect("second message").payload[..], b"second");
    Ok(())
}

/// Media against the track direction is refused on both paths; RTCP is not.
#[test]
fn test_direction_policy() -> Result<()> {
    let link = audio_link(Direction::SendRecv, Direction::SendOnly, 8);

    link.a.send_binary(Bytes::from_static(b"media"))?;
    assert!(link.b.peek().is_none());
    assert_eq!(link.counters.snapshot().bad_direction, 1);

    link.a.send(Message::control(Bytes::from_static(b"\x80\xc9\x00\x01rtcp")))?;
    assert!(link.b.receive().is_some_and(|m| m.is_control()));

    // SendOnly may send...
    assert!(link.b.send_binary(Bytes::from_static(b"back"))?);
    // ...but the peer, once made RecvOnly, may not.
    link.a
        .set_description(MediaDescription::audio("audio0", Direction::RecvOnly))?;
    assert!(!link.a.send_binary(Bytes::from_static(b"refused"))?);
    assert_eq!(link.counters.snapshot().bad_direction, 2);
    Ok(())
}

/// The available callback fires once per queued message with the queue length.
#[test]
fn test_available_callback() -> Result<()> {
    let link = audio_link(Direction::SendRecv, Direction::SendRecv, 2);

    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(AtomicUsize::new(0));
    let (c, l) = (calls.clone(), last.clone());
    link.b.events().on_available(move |count| {
        c.fetch_add(1, Ordering::SeqCst);
        l.store(count, Ordering::SeqCst);
    });

    for _ in 0..3 {
        link.a.send_binary(Bytes::from_static(b"x"))?;
    }

    // The third message was dropped and announced nothing.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(last.load(Ordering::SeqCst), 2);
    Ok(())
}
