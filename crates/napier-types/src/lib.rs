//! Shared types for the Napier voice-agent toolkit.
//!
//! This crate holds the vocabulary shared between the client-side session
//! layer (`napier-session`) and the proxy (`napier-server`): the runtime
//! platform, the session status, and the JSON bodies exchanged over the
//! proxy's HTTP and WebSocket surfaces.
//!
//! Nothing here performs I/O.

pub mod wire;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use wire::{
    ClientRequest, ConnectResponse, DisconnectResponse, ErrorBody, ExecuteToolRequest,
    ExecuteToolResponse, ProcessAudioResponse, RelayAction, RelayRequest, WsIncoming, WsOutgoing,
    NOT_CONNECTED,
};

/// Runtime platform a client session is running on.
///
/// Values match the platform identifiers reported by the host runtime and
/// forwarded to the voice agent as the `platform` context variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
    Windows,
    Macos,
}

impl Platform {
    /// All known platforms.
    pub const ALL: [Platform; 5] = [
        Platform::Ios,
        Platform::Android,
        Platform::Web,
        Platform::Windows,
        Platform::Macos,
    ];

    /// Returns the string identifier for this platform.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
            Self::Windows => "windows",
            Self::Macos => "macos",
        }
    }

    /// Whether code on this platform runs inside a browser document.
    pub fn is_browser(self) -> bool {
        matches!(self, Self::Web)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown platform identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            "web" => Ok(Self::Web),
            "windows" => Ok(Self::Windows),
            "macos" => Ok(Self::Macos),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}

/// Lifecycle status of a voice session.
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected
///                      \-> Disconnected (on failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl SessionStatus {
    /// Returns the string label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        }
    }

    /// Whether the session is between stable states.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
