//! Message model for everything that crosses a track.
//!
//! A message is a payload plus its class. Binary messages carry RTP media,
//! control messages carry RTCP. Only those two classes are routed through a
//! handler chain; the others pass handlers untouched.

use bytes::Bytes;

/// Largest payload a track accepts: 65535 minus SRTP auth tag and UDP header.
pub const MAX_MESSAGE_SIZE: usize = 65535 - 12 - 4;

/// Message class discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Binary = 0,
    String = 1,
    Control = 2,
    Reset = 3,
}

impl MessageKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Binary),
            1 => Some(Self::String),
            2 => Some(Self::Control),
            3 => Some(Self::Reset),
            _ => None,
        }
    }
}

/// A single packet travelling between the application and the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,

    /// Packet bytes. Cloning is a refcount bump.
    pub payload: Bytes,

    /// Differentiated-services code point, set by the track just before the
    /// message is handed to the transport. Zero until then.
    pub dscp: u8,
}

impl Message {
    pub fn new(kind: MessageKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            dscp: 0,
        }
    }

    /// Create an RTP-class message
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(MessageKind::Binary, payload)
    }

    /// Create an RTCP-class message
    pub fn control(payload: impl Into<Bytes>) -> Self {
        Self::new(MessageKind::Control, payload)
    }

    pub fn is_control(&self) -> bool {
        self.kind == MessageKind::Control
    }

    pub fn is_binary(&self) -> bool {
        self.kind == MessageKind::Binary
    }

    /// Bytes this message counts against a receive queue.
    ///
    /// Control and reset messages are free: they do not represent media the
    /// consumer has to drain.
    pub fn size(&self) -> usize {
        match self.kind {
            MessageKind::Binary | MessageKind::String => self.payload.len(),
            MessageKind::Control | MessageKind::Reset => 0,
        }
    }
}
