//! Media description carried by a track: identity, kind, and direction.

use std::fmt;
use std::str::FromStr;

use crate::qos::MediaType;

/// Direction attribute of a media section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    SendOnly,
    RecvOnly,
    #[default]
    SendRecv,
    Inactive,
}

impl Direction {
    /// Whether media may be sent on a track with this direction.
    pub fn can_send(self) -> bool {
        matches!(self, Self::SendOnly | Self::SendRecv)
    }

    /// Whether media may be received. Control packets ignore this.
    pub fn can_receive(self) -> bool {
        matches!(self, Self::RecvOnly | Self::SendRecv)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendOnly => "sendonly",
            Self::RecvOnly => "recvonly",
            Self::SendRecv => "sendrecv",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown direction: {0}")]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sendonly" => Ok(Self::SendOnly),
            "recvonly" => Ok(Self::RecvOnly),
            "sendrecv" => Ok(Self::SendRecv),
            "inactive" => Ok(Self::Inactive),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}

/// What a track knows about its media section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    /// Media identifier. Fixed for the lifetime of a track.
    pub mid: String,
    pub media_type: MediaType,
    pub direction: Direction,
}

impl MediaDescription {
    pub fn new(mid: impl Into<String>, media_type: MediaType, direction: Direction) -> Self {
        Self {
            mid: mid.into(),
            media_type,
            direction,
        }
    }

    pub fn audio(mid: impl Into<String>, direction: Direction) -> Self {
        Self::new(mid, MediaType::Audio, direction)
    }

    pub fn video(mid: impl Into<String>, direction: Direction) -> Self {
        Self::new(mid, MediaType::Video, direction)
    }
}
