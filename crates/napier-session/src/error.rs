use napier_types::{SessionStatus, NOT_CONNECTED};
use thiserror::Error;

/// Errors returned by session operations. Display strings are meant for users.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {operation} while {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("Please connect first")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure reported by the remote voice SDK.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SdkError(pub String);

impl SdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure talking to the Napier proxy.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to proxy failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("proxy rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl TransportError {
    /// Whether the proxy answered that it holds no session for this client,
    /// as it does after a restart.
    pub fn is_session_lost(&self) -> bool {
        matches!(self, Self::Rejected { status: 400, message } if message == NOT_CONNECTED)
    }
}
