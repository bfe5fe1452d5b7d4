use crate::*;

use anyhow::{Context, Result};
use bytes::Bytes;
use sluice_core::config::RtpConfig;
use sluice_core::{ChainElement, ChainableHandler, MediaHandler, MessageKind};
use sluice_media::rtp::{
    NackResponder, PliRequester, RtpHeader, RtpPacketizationConfig, RtpPacketizer,
};
use sluice_media::{Direction, MediaDescription, DSCP_AF42};

const SENDER_SSRC: u32 = 0x5e5e_0001;
const RECEIVER_SSRC: u32 = 0x5e5e_0002;

/// Sender chain: packetizer on the application side, NACK responder at the
/// network side so it stores finished packets.
fn sender_handler() -> Result<Arc<dyn MediaHandler>> {
    let handler = ChainableHandler::new(NackResponder::from_config(&RtpConfig::default()));
    handler.add_to_chain(ChainElement::new(RtpPacketizer::new(
        RtpPacketizationConfig::new(SENDER_SSRC, 96, 90_000),
    )))?;
    Ok(Arc::new(handler))
}

fn receiver_handler() -> Arc<dyn MediaHandler> {
    Arc::new(ChainableHandler::new(PliRequester::new(RECEIVER_SSRC)))
}

fn video_link() -> Result<Link> {
    init_tracing();
    let link = link(
        MediaDescription::video("video0", Direction::SendOnly),
        MediaDescription::video("video0", Direction::RecvOnly),
        &TrackConfig::default(),
    );
    link.a.set_rtcp_handler(Some(sender_handler()?));
    link.b.set_rtcp_handler(Some(receiver_handler()));
    Ok(link)
}

fn generic_nack(pid: u16, blp: u16) -> Message {
    let mut packet = Vec::with_capacity(16);
    packet.push(0x80 | 1);
    packet.push(205);
    packet.extend_from_slice(&3u16.to_be_bytes());
    packet.extend_from_slice(&RECEIVER_SSRC.to_be_bytes());
    packet.extend_from_slice(&SENDER_SSRC.to_be_bytes());
    packet.extend_from_slice(&pid.to_be_bytes());
    packet.extend_from_slice(&blp.to_be_bytes());
    Message::control(packet)
}

fn sequence_of(message: &Message) -> Result<u16> {
    Ok(RtpHeader::parse(&message.payload)
        .context("not an RTP packet")?
        .sequence())
}

/// Application payloads leave the sender as RTP and arrive queued at the receiver.
#[test]
fn test_media_is_packetized_end_to_end() -> Result<()> {
    let link = video_link()?;

    for frame in [&b"frame-0"[..], b"frame-1", b"frame-2"] {
        assert!(link.a.send_binary(Bytes::copy_from_slice(frame))?);
    }

    let sent = link.a_to_b.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|m| m.dscp == DSCP_AF42));

    let received = drain(&link.b);
    assert_eq!(received.len(), 3);
    for (i, message) in received.iter().enumerate() {
        let header = RtpHeader::parse(&message.payload).context("not an RTP packet")?;
        assert_eq!(header.ssrc(), SENDER_SSRC);
        assert_eq!(header.sequence(), i as u16);
        assert!(header.marker());
        assert_eq!(&message.payload[12..], format!("frame-{i}").as_bytes());
    }
    Ok(())
}

/// The receiver learns the sender SSRC from media and asks it for a keyframe.
#[test]
fn test_keyframe_request_reaches_sender() -> Result<()> {
    let link = video_link()?;

    // Nothing received yet: nobody to address a PLI to.
    assert!(!link.b.request_keyframe());

    link.a.send_binary(Bytes::from_static(b"frame"))?;
    drain(&link.b);

    assert!(link.b.request_keyframe());

    let pli = link.b_to_a.sent();
    assert_eq!(pli.len(), 1);
    assert_eq!(pli[0].kind, MessageKind::Control);
    // PSFB, FMT 1.
    assert_eq!(pli[0].payload[0] & 0x1f, 1);
    assert_eq!(pli[0].payload[1], 206);
    assert_eq!(&pli[0].payload[8..12], &SENDER_SSRC.to_be_bytes());

    // The PLI passes the sender chain untouched and is queued for the app.
    let at_sender = drain(&link.a);
    assert_eq!(at_sender, vec![pli[0].clone()]);
    Ok(())
}

/// A NACK from the receiver makes the sender chain retransmit stored packets.
#[test]
fn test_nack_triggers_retransmission() -> Result<()> {
    let link = video_link()?;

    for i in 0..5u8 {
        link.a.send_binary(Bytes::from(vec![i]))?;
    }
    drain(&link.b);

    // Lost: 1 and 3.
    assert!(link.b.outgoing(generic_nack(1, 0b10))?);

    let resent = drain(&link.b);
    let sequences = resent.iter().map(sequence_of).collect::<Result<Vec<_>>>()?;
    assert_eq!(sequences, vec![1, 3]);
    assert_eq!(link.a_to_b.sent().len(), 7);

    // A NACK for packets never sent gets no answer.
    link.b.outgoing(generic_nack(40, 0))?;
    assert!(drain(&link.b).is_empty());
    assert_eq!(link.a_to_b.sent().len(), 7);
    Ok(())
}
