//! Message products — what a chain stage hands to the next one.
//!
//! A product is a batch of binary packets, optionally paired with a control
//! packet. Batches are shared between stages without copying, and are never
//! mutated once built: a stage that rewrites a batch builds a new one.

use std::ops::Deref;
use std::sync::Arc;

use bytes::Bytes;

use crate::message::Message;

/// Ordered, shared, immutable batch of binary packets.
///
/// An empty batch is a real value, distinct from "no batch" (`None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagesProduct(Arc<[Bytes]>);

impl MessagesProduct {
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    pub fn single(packet: impl Into<Bytes>) -> Self {
        Self(Arc::from(vec![packet.into()]))
    }

    /// Whether two handles point at the very same batch.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for MessagesProduct {
    type Target = [Bytes];

    fn deref(&self) -> &[Bytes] {
        &self.0
    }
}

impl From<Vec<Bytes>> for MessagesProduct {
    fn from(packets: Vec<Bytes>) -> Self {
        Self(Arc::from(packets))
    }
}

impl FromIterator<Bytes> for MessagesProduct {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What a stage wants sent toward the network right now.
///
/// Both fields absent is a legal no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingProduct {
    pub messages: Option<MessagesProduct>,
    pub control: Option<Message>,
}

impl OutgoingProduct {
    pub fn new(messages: Option<MessagesProduct>, control: Option<Message>) -> Self {
        Self { messages, control }
    }

    pub fn messages(messages: MessagesProduct) -> Self {
        Self::new(Some(messages), None)
    }

    pub fn control(control: Message) -> Self {
        Self::new(None, Some(control))
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_none() && self.control.is_none()
    }
}

/// Result of processing an incoming binary batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingProduct {
    /// Packets that keep travelling upstream. `None` drops the batch.
    pub incoming: Option<MessagesProduct>,
    /// Immediate response, routed back toward the network.
    pub outgoing: Option<OutgoingProduct>,
}

impl IncomingProduct {
    pub fn pass(incoming: MessagesProduct) -> Self {
        Self {
            incoming: Some(incoming),
            outgoing: None,
        }
    }

    pub fn drop_with(outgoing: Option<OutgoingProduct>) -> Self {
        Self {
            incoming: None,
            outgoing,
        }
    }
}

/// Result of processing an incoming control packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingControlProduct {
    /// Control packet that keeps travelling upstream. `None` drops it.
    pub incoming: Option<Message>,
    pub outgoing: Option<OutgoingProduct>,
}

impl IncomingControlProduct {
    pub fn pass(incoming: Message) -> Self {
        Self {
            incoming: Some(incoming),
            outgoing: None,
        }
    }

    pub fn drop_with(outgoing: Option<OutgoingProduct>) -> Self {
        Self {
            incoming: None,
            outgoing,
        }
    }
}

/// Side channel for responses synthesized while processing incoming traffic.
///
/// Returns whether the response was accepted by the transport.
pub type Sender<'a> = &'a dyn Fn(OutgoingProduct) -> bool;
