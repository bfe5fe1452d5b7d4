//! RTP stages for the media chain.

pub mod header;
pub mod nack;
pub mod packetizer;
pub mod pli;

pub use header::{FeedbackHeader, NackItem, RtcpHeader, RtpHeader};
pub use nack::NackResponder;
pub use packetizer::{RtpPacketizationConfig, RtpPacketizer};
pub use pli::PliRequester;
