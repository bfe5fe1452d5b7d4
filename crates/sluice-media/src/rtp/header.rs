//! RTP and RTCP header layouts.
//!
//! Network byte order throughout. Layouts are zerocopy so parsing is a
//! bounds check and a copy, with no unsafe code.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::network_endian::{U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

pub const RTP_VERSION: u8 = 2;

/// RTCP transport-layer feedback (RFC 4585).
pub const PT_RTPFB: u8 = 205;
/// RTCP payload-specific feedback (RFC 4585).
pub const PT_PSFB: u8 = 206;
/// Generic NACK, under RTPFB.
pub const FMT_GENERIC_NACK: u8 = 1;
/// Picture loss indication, under PSFB.
pub const FMT_PLI: u8 = 1;

// ── RTP ───────────────────────────────────────────────────────────────────────

/// Fixed RTP header. CSRCs and extensions follow on the wire.
///
/// Wire size: 12 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct RtpHeader {
    /// V(2) P(1) X(1) CC(4)
    pub first: u8,
    /// M(1) PT(7)
    pub marker_payload_type: u8,
    pub sequence: U16,
    pub timestamp: U32,
    pub ssrc: U32,
}

assert_eq_size!(RtpHeader, [u8; 12]);

impl RtpHeader {
    pub fn new(payload_type: u8, marker: bool, sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            first: RTP_VERSION << 6,
            marker_payload_type: ((marker as u8) << 7) | (payload_type & 0x7f),
            sequence: U16::new(sequence),
            timestamp: U32::new(timestamp),
            ssrc: U32::new(ssrc),
        }
    }

    /// Parse the fixed header. `None` if short or not version 2.
    pub fn parse(packet: &[u8]) -> Option<Self> {
        let header = Self::read_from_prefix(packet)?;
        (header.version() == RTP_VERSION).then_some(header)
    }

    pub fn version(&self) -> u8 {
        self.first >> 6
    }

    pub fn csrc_count(&self) -> usize {
        (self.first & 0x0f) as usize
    }

    pub fn marker(&self) -> bool {
        self.marker_payload_type & 0x80 != 0
    }

    pub fn payload_type(&self) -> u8 {
        self.marker_payload_type & 0x7f
    }

    pub fn sequence(&self) -> u16 {
        self.sequence.get()
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp.get()
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc.get()
    }
}

// ── RTCP ──────────────────────────────────────────────────────────────────────

/// Common RTCP header.
///
/// Wire size: 4 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct RtcpHeader {
    /// V(2) P(1) RC/FMT(5)
    pub first: u8,
    pub packet_type: u8,
    /// Packet length in 32-bit words, minus one.
    pub length: U16,
}

assert_eq_size!(RtcpHeader, [u8; 4]);

impl RtcpHeader {
    /// `length_bytes` is the whole packet, header included. It is rounded
    /// down to 32-bit words and clamped to what the length field can carry,
    /// so anything under 4 bytes encodes a header-only packet.
    pub fn new(format: u8, packet_type: u8, length_bytes: usize) -> Self {
        let words = (length_bytes / 4).clamp(1, u16::MAX as usize + 1);
        Self {
            first: (RTP_VERSION << 6) | (format & 0x1f),
            packet_type,
            length: U16::new((words - 1) as u16),
        }
    }

    pub fn version(&self) -> u8 {
        self.first >> 6
    }

    /// Report count, or feedback message type for RTPFB/PSFB.
    pub fn format(&self) -> u8 {
        self.first & 0x1f
    }

    /// Total packet size in bytes, header included.
    pub fn packet_len(&self) -> usize {
        (self.length.get() as usize + 1) * 4
    }
}

/// Header shared by every RTCP feedback message (RFC 4585 §6.1).
///
/// Wire size: 12 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct FeedbackHeader {
    pub common: RtcpHeader,
    pub sender_ssrc: U32,
    pub media_ssrc: U32,
}

assert_eq_size!(FeedbackHeader, [u8; 12]);

/// One generic NACK entry: a lost packet id plus a bitmask of the 16 after it.
///
/// Wire size: 4 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct NackItem {
    pub pid: U16,
    pub blp: U16,
}

assert_eq_size!(NackItem, [u8; 4]);

impl NackItem {
    /// Every sequence number this entry reports lost.
    pub fn lost(&self) -> impl Iterator<Item = u16> {
        let pid = self.pid.get();
        let blp = self.blp.get();
        std::iter::once(pid).chain(
            (0..16u16)
                .filter(move |bit| blp & (1 << bit) != 0)
                .map(move |bit| pid.wrapping_add(bit + 1)),
        )
    }
}

/// Split a compound RTCP packet into its individual packets.
///
/// Stops at the first malformed packet.
pub fn rtcp_packets(compound: &[u8]) -> impl Iterator<Item = (RtcpHeader, &[u8])> {
    let mut rest = compound;
    std::iter::from_fn(move || {
        let header = RtcpHeader::read_from_prefix(rest)?;
        let len = header.packet_len();
        if header.version() != RTP_VERSION || len > rest.len() {
            return None;
        }
        let (packet, tail) = rest.split_at(len);
        rest = tail;
        Some((header, packet))
    })
}
