//! QoS — differentiated-services marking per media type.
//!
//! Marks follow the WebRTC QoS recommendations:
//!   audio      — EF   (46), expedited forwarding
//!   all others — AF42 (36), assured forwarding class 4, medium drop
//!
//! The values actually applied come from `TrackConfig`; these are the defaults.

use std::fmt;

use sluice_core::config::TrackConfig;

pub const DSCP_EF: u8 = 46;
pub const DSCP_AF42: u8 = 36;

/// Media kind of a track, as named in its description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    Video,
    Application,
    Other(String),
}

impl MediaType {
    pub fn parse(s: &str) -> Self {
        match s {
            "audio" => Self::Audio,
            "video" => Self::Video,
            "application" => Self::Application,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Application => "application",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DSCP value for packets of the given media type.
pub fn dscp_for(media_type: &MediaType, config: &TrackConfig) -> u8 {
    match media_type {
        MediaType::Audio => config.audio_dscp,
        _ => config.video_dscp,
    }
}
