//! Keyframe requests toward the remote sender.
//!
//! The requester learns the remote media SSRC from the RTP it receives and
//! answers a keyframe request with a picture loss indication.

use std::sync::atomic::{AtomicU32, Ordering};

use zerocopy::byteorder::network_endian::U32;
use zerocopy::AsBytes;

use sluice_core::{IncomingProduct, MediaProcessor, Message, MessagesProduct, OutgoingProduct};

use super::header::{FeedbackHeader, RtcpHeader, RtpHeader, FMT_PLI, PT_PSFB};

pub struct PliRequester {
    sender_ssrc: u32,
    media_ssrc: AtomicU32,
}

impl PliRequester {
    pub fn new(sender_ssrc: u32) -> Self {
        Self {
            sender_ssrc,
            media_ssrc: AtomicU32::new(0),
        }
    }

    /// Remote SSRC seen most recently. Zero until RTP has arrived.
    pub fn media_ssrc(&self) -> u32 {
        self.media_ssrc.load(Ordering::Relaxed)
    }

    pub fn pli(&self) -> Message {
        let header = FeedbackHeader {
            common: RtcpHeader::new(FMT_PLI, PT_PSFB, std::mem::size_of::<FeedbackHeader>()),
            sender_ssrc: U32::new(self.sender_ssrc),
            media_ssrc: U32::new(self.media_ssrc()),
        };
        Message::control(header.as_bytes().to_vec())
    }
}

impl MediaProcessor for PliRequester {
    fn name(&self) -> &str {
        "pli-requester"
    }

    fn process_incoming_binary(&self, messages: MessagesProduct) -> IncomingProduct {
        if let Some(header) = messages.last().and_then(|p| RtpHeader::parse(p)) {
            self.media_ssrc.store(header.ssrc(), Ordering::Relaxed);
        }
        IncomingProduct::pass(messages)
    }

    fn request_keyframe(&self) -> Option<OutgoingProduct> {
        let ssrc = self.media_ssrc();
        if ssrc == 0 {
            tracing::debug!("no remote SSRC yet, cannot request keyframe");
            return None;
        }
        tracing::debug!(media_ssrc = ssrc, "requesting keyframe");
        Some(OutgoingProduct::control(self.pli()))
    }
}
