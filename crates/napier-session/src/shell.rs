//! Proxy-backed session for the embeddable widget.
//!
//! There is no SDK session here: the shell owns the connection status and
//! reconciles it with the proxy's answers. Any connect answer that is not a
//! success leaves the shell `Disconnected`, and so does a proxy that reports
//! it no longer knows this client.

use crate::error::{SessionError, TransportError};
use crate::events::{EventBus, SessionEvent};
use crate::guard::{self, Resettable, Rollback};
use crate::host::{AudioCapture, CaptureError};
use crate::proxy_client::ProxyTransport;
use napier_types::SessionStatus;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct ShellState {
    status: SessionStatus,
    acquiring: bool,
    session_id: Option<String>,
    /// Capture may be open. Survives a reset so the next connect releases a
    /// device left open by a cancelled operation.
    capture_open: bool,
}

impl Resettable for ShellState {
    fn reset(&mut self) -> SessionStatus {
        self.acquiring = false;
        self.session_id = None;
        std::mem::take(&mut self.status)
    }
}

pub struct WidgetShell<T, A> {
    transport: T,
    capture: A,
    state: Mutex<ShellState>,
    events: EventBus,
}

impl<T: ProxyTransport, A: AudioCapture> WidgetShell<T, A> {
    pub fn new(transport: T, capture: A) -> Self {
        Self {
            transport,
            capture,
            state: Mutex::new(ShellState::default()),
            events: EventBus::new(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    /// Proxy session id while connected.
    pub fn session_id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Opens the microphone, then registers with the proxy.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let stale_capture = {
            let mut state = self.lock();
            if state.acquiring {
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
            state.acquiring = true;
            state.capture_open
        };
        let rollback = Rollback::arm(&self.state, &self.events, "connect");

        if stale_capture {
            self.capture.release().await;
        }
        self.lock().capture_open = true;
        let acquired = self.capture.acquire().await;
        {
            let mut state = self.lock();
            state.acquiring = false;
            if acquired.is_ok() {
                state.status = SessionStatus::Connecting;
            } else {
                state.capture_open = false;
            }
        }

        if let Err(e) = acquired {
            rollback.complete();
            tracing::info!("audio capture not acquired: {}", e);
            let message = match e {
                CaptureError::Denied => SessionError::PermissionDenied.to_string(),
                other => other.to_string(),
            };
            self.events.emit(SessionEvent::PermissionDenied { message });
            return Err(SessionError::PermissionDenied);
        }

        let failure = match self.transport.connect().await {
            Ok(resp) if resp.success => {
                {
                    let mut state = self.lock();
                    state.status = SessionStatus::Connected;
                    state.session_id = Some(resp.session_id.clone());
                }
                rollback.complete();
                tracing::info!(session_id = %resp.session_id, "widget connected to proxy");
                self.events.emit(SessionEvent::Connected {
                    conversation_id: resp.session_id,
                });
                return Ok(());
            }
            Ok(resp) => format!("proxy refused connection: {}", resp.message),
            Err(e) => e.to_string(),
        };

        self.capture.release().await;
        {
            let mut state = self.lock();
            state.capture_open = false;
            state.status = SessionStatus::Disconnected;
        }
        rollback.complete();
        tracing::warn!("widget connect failed: {}", failure);
        self.events.emit(SessionEvent::Error {
            message: failure.clone(),
        });
        Err(SessionError::Connect(failure))
    }

    /// Uploads one chunk of captured audio and returns the agent's reply.
    pub async fn send_audio(&self, chunk: Vec<u8>) -> Result<Value, SessionError> {
        self.require_connected()?;
        match self.transport.process_audio(chunk).await {
            Ok(resp) => {
                self.events.emit(SessionEvent::Message(resp.response.clone()));
                Ok(resp.response)
            }
            Err(e) => {
                self.events.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                self.reconcile(&e).await;
                Err(e.into())
            }
        }
    }

    /// Runs a tool through the proxy's tool endpoint.
    pub async fn execute_tool(&self, tool: &str, data: Value) -> Result<Value, SessionError> {
        self.require_connected()?;
        let outcome = self.transport.execute_tool(tool, data).await;
        self.events.emit(SessionEvent::ToolInvoked {
            name: tool.to_string(),
            ok: outcome.is_ok(),
        });
        match outcome {
            Ok(resp) => Ok(resp.result),
            Err(e) => {
                self.reconcile(&e).await;
                Err(e.into())
            }
        }
    }

    /// Stops capture and deregisters from the proxy. Always ends
    /// `Disconnected`, even if the proxy call fails.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        {
            let mut state = self.lock();
            if state.status != SessionStatus::Connected {
                return Err(SessionError::InvalidState {
                    operation: "disconnect",
                    status: state.status,
                });
            }
            state.status = SessionStatus::Disconnecting;
        }
        let rollback = Rollback::arm(&self.state, &self.events, "disconnect");

        self.capture.release().await;
        self.lock().capture_open = false;
        if let Err(e) = self.transport.disconnect().await {
            tracing::warn!("proxy disconnect failed: {}", e);
        }

        {
            let mut state = self.lock();
            state.status = SessionStatus::Disconnected;
            state.session_id = None;
        }
        rollback.complete();
        self.events.emit(SessionEvent::Disconnected);
        Ok(())
    }

    /// Call-button action; mirrors
    /// [`SessionController::toggle`](crate::SessionController::toggle).
    pub async fn toggle(&self) -> Result<crate::Toggle, SessionError> {
        use crate::Toggle;

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

    /// Drops to `Disconnected` when the proxy has lost this client's
    /// session. Capture is released; no disconnect is sent.
    async fn reconcile(&self, error: &TransportError) {
        if !error.is_session_lost() {
            return;
        }
        {
            let mut state = self.lock();
            if state.status != SessionStatus::Connected {
                return;
            }
            state.status = SessionStatus::Disconnecting;
        }
        let rollback = Rollback::arm(&self.state, &self.events, "reconcile");

        tracing::warn!("proxy no longer holds this client's session, disconnecting");
        self.capture.release().await;
        {
            let mut state = self.lock();
            state.capture_open = false;
            state.status = SessionStatus::Disconnected;
            state.session_id = None;
        }
        rollback.complete();
        self.events.emit(SessionEvent::Disconnected);
    }

    fn require_connected(&self) -> Result<(), SessionError> {
        if self.status() == SessionStatus::Connected {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    fn lock(&self) -> MutexGuard<'_, ShellState> {
        guard::lock(&self.state)
    }
}
