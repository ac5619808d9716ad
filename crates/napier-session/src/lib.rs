//! Voice session lifecycle for Napier clients.
//!
//! Two front ends share one state machine
//! (`Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected`)
//! and one event vocabulary ([`SessionEvent`]):
//!
//! - [`SessionController`] drives a managed voice SDK ([`VoiceSdk`]). It asks
//!   for microphone permission, builds the platform's
//!   [`ToolRegistry`](napier_tools::ToolRegistry), starts the remote session,
//!   and answers the agent's tool calls while connected.
//! - [`WidgetShell`] is the embeddable variant with no SDK. It captures audio
//!   locally and routes every exchange through the Napier proxy
//!   ([`ProxyTransport`], implemented over HTTP by [`ProxyClient`]).
//!
//! Starting a session while one is active is rejected with
//! [`SessionError::InvalidState`]; it never tears down the active session.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
mod guard;
pub mod host;
pub mod proxy_client;
pub mod sdk;
pub mod shell;

pub use config::{ProxyClientConfig, SessionSettings};
pub use controller::{SessionController, Toggle, ToolCallResponse};
pub use error::{SdkError, SessionError, TransportError};
pub use events::{EventBus, SessionEvent};
pub use host::{AudioCapture, CaptureError, MicrophonePermission, PermissionStatus};
pub use proxy_client::{ProxyClient, ProxyTransport};
pub use sdk::{SessionStart, VoiceSdk};
pub use shell::WidgetShell;
