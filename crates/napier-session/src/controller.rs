//! SDK-backed session lifecycle controller.

use crate::config::SessionSettings;
use crate::error::SessionError;
use crate::events::{EventBus, SessionEvent};
use crate::guard::{self, Resettable, Rollback};
use crate::host::{MicrophonePermission, PermissionStatus};
use crate::sdk::{SessionStart, VoiceSdk};
use napier_tools::{build_registry, EnvironmentCapabilities, ToolRegistry};
use napier_types::SessionStatus;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

/// Error returned for tool calls outside a connected session.
pub const NOT_CONNECTED: &str = "session not connected";

/// Answer to a remote tool call, serialized as `{"result": ...}` or
/// `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallResponse {
    Result(Value),
    Error(String),
}

impl ToolCallResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// What a [`SessionController::toggle`] press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Connected,
    Disconnected,
    /// The session was mid-transition; nothing happened.
    Ignored,
}

#[derive(Default)]
struct ControllerState {
    status: SessionStatus,
    /// A connect is waiting on the permission prompt. Status stays
    /// `Disconnected` meanwhile.
    awaiting_permission: bool,
    conversation_id: Option<String>,
    registry: Option<Arc<ToolRegistry>>,
}

impl Resettable for ControllerState {
    fn reset(&mut self) -> SessionStatus {
        std::mem::take(self).status
    }
}

/// Owns one voice session against a managed SDK.
///
/// At most one session is active per controller. The internal lock is never
/// held across an `.await`, so tool calls from the SDK can be answered while
/// a lifecycle operation is in flight. Dropping a `connect` or `disconnect`
/// future before it finishes leaves the controller `Disconnected`.
pub struct SessionController<S, P> {
    sdk: S,
    permission: P,
    env: EnvironmentCapabilities,
    settings: SessionSettings,
    state: Mutex<ControllerState>,
    events: EventBus,
}

impl<S: VoiceSdk, P: MicrophonePermission> SessionController<S, P> {
    pub fn new(
        sdk: S,
        permission: P,
        env: EnvironmentCapabilities,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sdk,
            permission,
            env,
            settings,
            state: Mutex::new(ControllerState::default()),
            events: EventBus::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.lock().conversation_id.clone()
    }

    /// Names of the tools exposed to the active session.
    pub fn active_tools(&self) -> Vec<&'static str> {
        self.lock()
            .registry
            .as_ref()
            .map(|r| r.names())
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Starts a session.
    ///
    /// Only valid from `Disconnected`. A denied permission prompt leaves the
    /// status untouched and never reaches the SDK.
    pub async fn connect(&self) -> Result<(), SessionError> {
        {
            let mut state = self.lock();
            if state.awaiting_permission {
                return Err(SessionError::InvalidState {
                    operation: "connect",
                    status: SessionStatus::Connecting,
                });
            }
            if state.status != SessionStatus::Disconnected {
                return Err(SessionError::InvalidState {
                    operation: "connect",
                    status: state.status,
                });
            }
            state.awaiting_permission = true;
        }
        let rollback = Rollback::arm(&self.state, &self.events, "connect");

        let permission = self.permission.request().await;

        {
            let mut state = self.lock();
            state.awaiting_permission = false;
            if permission == PermissionStatus::Denied {
                drop(state);
                rollback.complete();
                tracing::info!("microphone permission denied, staying disconnected");
                self.events.emit(SessionEvent::PermissionDenied {
                    message: SessionError::PermissionDenied.to_string(),
                });
                return Err(SessionError::PermissionDenied);
            }
            state.status = SessionStatus::Connecting;
        }

        let registry = Arc::new(build_registry(self.settings.platform, &self.env));
        let start = SessionStart {
            agent_id: self.settings.agent_id.clone(),
            client_tools: registry.definitions(),
            dynamic_variables: self.settings.dynamic_variables(),
        };

        tracing::info!(
            agent_id = %start.agent_id,
            platform = self.settings.platform.as_str(),
            tools = registry.len(),
            "starting voice session"
        );

        match self.sdk.start_session(start).await {
            Ok(conversation_id) => {
                {
                    let mut state = self.lock();
                    state.status = SessionStatus::Connected;
                    state.conversation_id = Some(conversation_id.clone());
                    state.registry = Some(registry);
                }
                rollback.complete();
                tracing::info!(conversation_id = %conversation_id, "voice session connected");
                self.events
                    .emit(SessionEvent::Connected { conversation_id });
                Ok(())
            }
            Err(e) => {
                self.lock().status = SessionStatus::Disconnected;
                rollback.complete();
                tracing::warn!("failed to start voice session: {}", e);
                self.events.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                Err(SessionError::Connect(e.to_string()))
            }
        }
    }

    /// Ends the active session.
    ///
    /// Only valid from `Connected`. The remote end call is best-effort and
    /// bounded by the configured timeout; the controller always lands in
    /// `Disconnected`.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let conversation_id = {
            let mut state = self.lock();
            if state.status != SessionStatus::Connected {
                return Err(SessionError::InvalidState {
                    operation: "disconnect",
                    status: state.status,
                });
            }
            state.status = SessionStatus::Disconnecting;
            state.registry = None;
            state.conversation_id.take()
        };
        let rollback = Rollback::arm(&self.state, &self.events, "disconnect");

        if let Some(id) = conversation_id.as_deref() {
            let timeout = self.settings.end_session_timeout();
            match tokio::time::timeout(timeout, self.sdk.end_session(id)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(conversation_id = id, "end session failed: {}", e)
                }
                Err(_) => tracing::warn!(
                    conversation_id = id,
                    timeout_ms = timeout.as_millis() as u64,
                    "end session timed out"
                ),
            }
        }

        self.lock().status = SessionStatus::Disconnected;
        rollback.complete();
        tracing::info!("voice session disconnected");
        self.events.emit(SessionEvent::Disconnected);
        Ok(())
    }

    /// The single call-button action: connect when disconnected, disconnect
    /// when connected, nothing otherwise.
    pub async fn toggle(&self) -> Result<Toggle, SessionError> {
        let status = self.status();
        if status.is_transitional() {
            return Ok(Toggle::Ignored);
        }
        let outcome = if status == SessionStatus::Connected {
            self.disconnect().await.map(|()| Toggle::Disconnected)
        } else {
            self.connect().await.map(|()| Toggle::Connected)
        };
        match outcome {
            Err(SessionError::InvalidState { .. }) => Ok(Toggle::Ignored),
            other => other,
        }
    }

    /// Answers a tool call from the remote agent.
    ///
    /// Never changes the session status. Failures, including handler panics,
    /// come back as [`ToolCallResponse::Error`].
    pub async fn handle_tool_call(&self, name: &str, args: Value) -> ToolCallResponse {
        let registry = {
            let state = self.lock();
            match (&state.registry, state.status) {
                (Some(registry), SessionStatus::Connected) => Arc::clone(registry),
                _ => {
                    tracing::debug!(tool = name, status = %state.status, "tool call outside session");
                    return ToolCallResponse::Error(NOT_CONNECTED.to_string());
                }
            }
        };

        let response = match registry.invoke(name, args).await {
            Ok(value) => ToolCallResponse::Result(value),
            Err(e) => ToolCallResponse::Error(e.to_string()),
        };

        self.events.emit(SessionEvent::ToolInvoked {
            name: name.to_string(),
            ok: !response.is_error(),
        });
        response
    }

    /// Relays an agent message to observers while connected.
    pub fn relay_message(&self, message: Value) {
        if self.status() == SessionStatus::Connected {
            self.events.emit(SessionEvent::Message(message));
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        guard::lock(&self.state)
    }
}
