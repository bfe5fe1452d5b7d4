//! NACK responder — retransmits recently sent RTP packets on request.
//!
//! Sits on the network side of the packetizer so it sees finished RTP
//! packets. Packets are kept by sequence number. Only sequences in the
//! window `(n - capacity, n]` behind the newest stored packet `n` are kept.

use bytes::Bytes;
use dashmap::DashMap;
use zerocopy::FromBytes;

use sluice_core::config::RtpConfig;
use sluice_core::{IncomingControlProduct, MediaProcessor, Message, MessagesProduct, OutgoingProduct};

use super::header::{
    rtcp_packets, FeedbackHeader, NackItem, RtpHeader, FMT_GENERIC_NACK, PT_RTPFB,
};

pub struct NackResponder {
    history: DashMap<u16, Bytes>,
    capacity: u16,
}

impl NackResponder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, u16::MAX as usize / 2) as u16;
        Self {
            history: DashMap::with_capacity(capacity as usize),
            capacity,
        }
    }

    /// Responder sized by `[rtp] nack_history`.
    pub fn from_config(config: &RtpConfig) -> Self {
        Self::new(config.nack_history)
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn stored(&self) -> usize {
        self.history.len()
    }

    fn store(&self, packet: &Bytes) {
        let Some(header) = RtpHeader::parse(packet) else {
            tracing::trace!(len = packet.len(), "not an RTP packet, not stored");
            return;
        };
        let sequence = header.sequence();
        self.history.insert(sequence, packet.clone());
        self.history.remove(&sequence.wrapping_sub(self.capacity));

        // A jump in sequence numbers leaves entries the single removal above
        // never reaches.
        if self.history.len() > self.capacity as usize {
            let capacity = self.capacity;
            self.history
                .retain(|seq, _| sequence.wrapping_sub(*seq) < capacity);
        }
    }

    /// Sequence numbers requested by every generic NACK in `compound`.
    fn requested(compound: &[u8]) -> Vec<u16> {
        let mut lost = Vec::new();
        for (header, packet) in rtcp_packets(compound) {
            if header.packet_type != PT_RTPFB || header.format() != FMT_GENERIC_NACK {
                continue;
            }
            let items = packet.get(std::mem::size_of::<FeedbackHeader>()..).unwrap_or_default();
            for chunk in items.chunks_exact(std::mem::size_of::<NackItem>()) {
                if let Some(item) = NackItem::read_from(chunk) {
                    lost.extend(item.lost());
                }
            }
        }
        lost
    }
}

impl MediaProcessor for NackResponder {
    fn name(&self) -> &str {
        "nack-responder"
    }

    fn process_outgoing_binary(&self, product: OutgoingProduct) -> Option<OutgoingProduct> {
        if let Some(packets) = &product.messages {
            packets.iter().for_each(|p| self.store(p));
        }
        Some(product)
    }

    fn process_incoming_control(&self, message: Message) -> IncomingControlProduct {
        let requested = Self::requested(&message.payload);
        if requested.is_empty() {
            return IncomingControlProduct::pass(message);
        }

        let resend: MessagesProduct = requested
            .iter()
            .filter_map(|seq| self.history.get(seq).map(|p| p.value().clone()))
            .collect();
        tracing::debug!(
            requested = requested.len(),
            found = resend.len(),
            "answering NACK"
        );

        let outgoing = (!resend.is_empty()).then(|| OutgoingProduct::messages(resend));
        IncomingControlProduct {
            incoming: Some(message),
            outgoing,
        }
    }
}
