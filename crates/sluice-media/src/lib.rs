//! sluice-media — tracks, receive queues, and RTP chain stages.
//!
//! A [`Track`] connects one media section to a transport. Everything the
//! track sends or receives passes through the handler chain from
//! `sluice-core`.

pub mod channel;
pub mod counters;
pub mod description;
pub mod qos;
pub mod queue;
pub mod rtp;
pub mod track;
pub mod transport;

pub use channel::{Channel, ChannelEvents};
pub use counters::{spawn_configured_reporter, spawn_reporter, CounterSnapshot, TrackCounters};
pub use description::{Direction, MediaDescription, UnknownDirection};
pub use qos::{dscp_for, MediaType, DSCP_AF42, DSCP_EF};
pub use queue::RecvQueue;
pub use track::{Track, TrackError};
pub use transport::MediaTransport;
