//! Host-environment collaborators: microphone permission and audio capture.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Prompts the user for microphone access.
#[async_trait]
pub trait MicrophonePermission: Send + Sync {
    async fn request(&self) -> PermissionStatus;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("microphone access denied")]
    Denied,

    #[error("audio capture unavailable: {0}")]
    Unavailable(String),
}

/// Local audio-capture device used by the widget shell.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Opens the microphone; implies a permission prompt.
    async fn acquire(&self) -> Result<(), CaptureError>;

    /// Stops capture and releases the device. Idempotent.
    async fn release(&self);
}
