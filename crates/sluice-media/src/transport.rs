//! Transport the track hands outgoing packets to.
//!
//! The transport owns encryption and the socket write. The track keeps only
//! a weak handle, so a torn-down transport is observed as "gone" rather
//! than kept alive by its tracks.

use sluice_core::Message;

/// Lower layer a track sends media through.
pub trait MediaTransport: Send + Sync {
    /// Protect and write one packet. The DSCP mark is already set.
    ///
    /// Failure is reported as `false` only; nothing is retried.
    fn send_media(&self, message: Message) -> bool;
}
