//! RTP packetizer — wraps outgoing payloads in RTP headers.

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use zerocopy::AsBytes;

use sluice_core::{MediaProcessor, MessagesProduct, OutgoingProduct};

use super::header::RtpHeader;

/// Per-stream RTP state. The packetizer advances `sequence_number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacketizationConfig {
    pub ssrc: u32,
    pub payload_type: u8,
    pub clock_rate: u32,
    pub sequence_number: u16,
    pub timestamp: u32,
}

impl RtpPacketizationConfig {
    pub fn new(ssrc: u32, payload_type: u8, clock_rate: u32) -> Self {
        Self {
            ssrc,
            payload_type,
            clock_rate,
            sequence_number: 0,
            timestamp: 0,
        }
    }

    /// Convert a media time in seconds to RTP clock ticks.
    pub fn seconds_to_timestamp(&self, seconds: f64) -> u32 {
        (seconds * self.clock_rate as f64).round() as u64 as u32
    }
}

/// Prepends an RTP header to every outgoing payload.
///
/// All packets of one outgoing batch share the current timestamp; the
/// marker bit is set on the last one.
pub struct RtpPacketizer {
    config: Mutex<RtpPacketizationConfig>,
}

impl RtpPacketizer {
    pub fn new(config: RtpPacketizationConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    /// Build one RTP packet and advance the sequence number.
    pub fn packetize(&self, payload: &[u8], marker: bool) -> Bytes {
        let mut config = self.config.lock();
        let header = RtpHeader::new(
            config.payload_type,
            marker,
            config.sequence_number,
            config.timestamp,
            config.ssrc,
        );
        config.sequence_number = config.sequence_number.wrapping_add(1);

        let mut packet = BytesMut::with_capacity(12 + payload.len());
        packet.put_slice(header.as_bytes());
        packet.put_slice(payload);
        packet.freeze()
    }

    pub fn set_timestamp(&self, timestamp: u32) {
        self.config.lock().timestamp = timestamp;
    }

    pub fn config(&self) -> RtpPacketizationConfig {
        self.config.lock().clone()
    }
}

impl MediaProcessor for RtpPacketizer {
    fn name(&self) -> &str {
        "rtp-packetizer"
    }

    fn process_outgoing_binary(&self, product: OutgoingProduct) -> Option<OutgoingProduct> {
        let Some(payloads) = product.messages else {
            return Some(product);
        };
        let last = payloads.len().saturating_sub(1);
        let packets: MessagesProduct = payloads
            .iter()
            .enumerate()
            .map(|(i, payload)| self.packetize(payload, i == last))
            .collect();
        Some(OutgoingProduct::new(Some(packets), product.control))
    }
}
