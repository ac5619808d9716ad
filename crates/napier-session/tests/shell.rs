use async_trait::async_trait;
use napier_session::{
    AudioCapture, CaptureError, ProxyTransport, SessionError, SessionEvent, Toggle,
    TransportError, WidgetShell,
};
use napier_types::{
    ConnectResponse, DisconnectResponse, ExecuteToolResponse, ProcessAudioResponse, SessionStatus,
    NOT_CONNECTED,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Consumes one pending stall, if any.
fn take_stall(stalls: &AtomicUsize) -> bool {
    stalls
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn session_lost() -> TransportError {
    TransportError::Rejected {
        status: 400,
        message: NOT_CONNECTED.to_string(),
    }
}

#[derive(Default)]
struct Calls {
    connect: AtomicUsize,
    disconnect: AtomicUsize,
    audio: AtomicUsize,
}

struct FakeProxy {
    calls: Arc<Calls>,
    refuse_connect: bool,
    fail_disconnect: bool,
    stall_disconnect: bool,
    stalled_connects: AtomicUsize,
    /// Answers audio and tool calls as a proxy that forgot the client.
    session_lost: bool,
}

impl FakeProxy {
    fn new() -> Self {
        Self {
            calls: Arc::new(Calls::default()),
            refuse_connect: false,
            fail_disconnect: false,
            stall_disconnect: false,
            stalled_connects: AtomicUsize::new(0),
            session_lost: false,
        }
    }
}

#[async_trait]
impl ProxyTransport for FakeProxy {
    async fn connect(&self) -> Result<ConnectResponse, TransportError> {
        self.calls.connect.fetch_add(1, Ordering::SeqCst);
        if take_stall(&self.stalled_connects) {
            std::future::pending::<()>().await;
        }
        Ok(ConnectResponse {
            success: !self.refuse_connect,
            session_id: "session_abc".to_string(),
            message: "Connected to Napier AI service".to_string(),
        })
    }

    async fn disconnect(&self) -> Result<DisconnectResponse, TransportError> {
        self.calls.disconnect.fetch_add(1, Ordering::SeqCst);
        if self.stall_disconnect {
            std::future::pending::<()>().await;
        }
        if self.fail_disconnect {
            return Err(TransportError::Rejected {
                status: 500,
                message: "boom".to_string(),
            });
        }
        Ok(DisconnectResponse {
            success: true,
            message: "Disconnected from Napier AI service".to_string(),
        })
    }

    async fn process_audio(&self, audio: Vec<u8>) -> Result<ProcessAudioResponse, TransportError> {
        self.calls.audio.fetch_add(1, Ordering::SeqCst);
        if self.session_lost {
            return Err(session_lost());
        }
        Ok(ProcessAudioResponse {
            success: true,
            message: "Audio processed successfully".to_string(),
            response: json!({"bytes": audio.len()}),
        })
    }

    async fn execute_tool(
        &self,
        tool: &str,
        _data: Value,
    ) -> Result<ExecuteToolResponse, TransportError> {
        if self.session_lost {
            return Err(session_lost());
        }
        if tool == "battery" {
            Ok(ExecuteToolResponse {
                success: true,
                message: "Tool battery executed successfully".to_string(),
                result: json!({"batteryLevel": "0.50"}),
            })
        } else {
            Err(TransportError::Rejected {
                status: 400,
                message: format!("Unknown tool: {tool}"),
            })
        }
    }
}

#[derive(Default)]
struct FakeMic {
    deny: bool,
    open: Arc<AtomicBool>,
    releases: Arc<AtomicUsize>,
    /// Acquires that open the device, then never return.
    stalled_acquires: AtomicUsize,
}

#[async_trait]
impl AudioCapture for FakeMic {
    async fn acquire(&self) -> Result<(), CaptureError> {
        if self.deny {
            return Err(CaptureError::Denied);
        }
        self.open.store(true, Ordering::SeqCst);
        if take_stall(&self.stalled_acquires) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn connect_send_and_disconnect() {
    let proxy = FakeProxy::new();
    let calls = Arc::clone(&proxy.calls);
    let mic = FakeMic::default();
    let open = Arc::clone(&mic.open);
    let shell = WidgetShell::new(proxy, mic);
    let mut events = shell.subscribe();

    shell.connect().await.unwrap();
    assert_eq!(shell.status(), SessionStatus::Connected);
    assert_eq!(shell.session_id().as_deref(), Some("session_abc"));
    assert!(open.load(Ordering::SeqCst));
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Connected {
            conversation_id: "session_abc".to_string()
        }
    );

    let reply = shell.send_audio(vec![0u8; 16]).await.unwrap();
    assert_eq!(reply, json!({"bytes": 16}));
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::Message(json!({"bytes": 16}))
    );

    shell.disconnect().await.unwrap();
    assert_eq!(shell.status(), SessionStatus::Disconnected);
    assert!(shell.session_id().is_none());
    assert!(!open.load(Ordering::SeqCst));
    assert_eq!(calls.disconnect.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn denied_microphone_skips_the_proxy() {
    let proxy = FakeProxy::new();
    let calls = Arc::clone(&proxy.calls);
    let shell = WidgetShell::new(
        proxy,
        FakeMic {
            deny: true,
            ..FakeMic::default()
        },
    );
    let mut events = shell.subscribe();

    let err = shell.connect().await.unwrap_err();
    assert!(matches!(err, SessionError::PermissionDenied));
    assert_eq!(shell.status(), SessionStatus::Disconnected);
    assert_eq!(calls.connect.load(Ordering::SeqCst), 0);
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::PermissionDenied { .. }
    ));
}

#[tokio::test]
async fn refused_connect_releases_the_microphone() {
    let mut proxy = FakeProxy::new();
    proxy.refuse_connect = true;
    let mic = FakeMic::default();
    let open = Arc::clone(&mic.open);
    let shell = WidgetShell::new(proxy, mic);
    let mut events = shell.subscribe();

    let err = shell.connect().await.unwrap_err();
    assert!(matches!(err, SessionError::Connect(_)));
    assert_eq!(shell.status(), SessionStatus::Disconnected);
    assert!(!open.load(Ordering::SeqCst));
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Error { .. }
    ));
}

#[tokio::test]
async fn audio_and_tools_need_a_connection() {
    let proxy = FakeProxy::new();
    let calls = Arc::clone(&proxy.calls);
    let shell = WidgetShell::new(proxy, FakeMic::default());

    let err = shell.send_audio(vec![1, 2, 3]).await.unwrap_err();
    assert!(matches!(err, SessionError::NotConnected));
    assert_eq!(err.to_string(), "Please connect first");

    let err = shell.execute_tool("battery", json!({})).await.unwrap_err();
    assert!(matches!(err, SessionError::NotConnected));
    assert_eq!(calls.audio.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tool_results_and_rejections() {
    let shell = WidgetShell::new(FakeProxy::new(), FakeMic::default());
    shell.connect().await.unwrap();

    let result = shell.execute_tool("battery", json!({})).await.unwrap();
    assert_eq!(result, json!({"batteryLevel": "0.50"}));

    let err = shell.execute_tool("teleport", json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Transport(TransportError::Rejected { status: 400, .. })
    ));
    assert_eq!(shell.status(), SessionStatus::Connected);
}

#[tokio::test]
async fn failed_proxy_disconnect_still_disconnects() {
    let mut proxy = FakeProxy::new();
    proxy.fail_disconnect = true;
    let shell = WidgetShell::new(proxy, FakeMic::default());

    shell.connect().await.unwrap();
    shell.disconnect().await.unwrap();
    assert_eq!(shell.status(), SessionStatus::Disconnected);
}

#[tokio::test]
async fn connect_twice_is_rejected() {
    let proxy = FakeProxy::new();
    let calls = Arc::clone(&proxy.calls);
    let shell = WidgetShell::new(proxy, FakeMic::default());

    shell.connect().await.unwrap();
    assert!(matches!(
        shell.connect().await.unwrap_err(),
        SessionError::InvalidState { .. }
    ));
    assert_eq!(calls.connect.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn toggle_round_trip() {
    let shell = WidgetShell::new(FakeProxy::new(), FakeMic::default());
    assert_eq!(shell.toggle().await.unwrap(), Toggle::Connected);
    assert_eq!(shell.toggle().await.unwrap(), Toggle::Disconnected);
}

#[tokio::test]
async fn lost_proxy_session_disconnects_the_shell() {
    let mut proxy = FakeProxy::new();
    proxy.session_lost = true;
    let calls = Arc::clone(&proxy.calls);
    let mic = FakeMic::default();
    let open = Arc::clone(&mic.open);
    let shell = WidgetShell::new(proxy, mic);
    shell.connect().await.unwrap();
    let mut events = shell.subscribe();

    let err = shell.send_audio(vec![0u8; 8]).await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(ref e) if e.is_session_lost()));
    assert_eq!(shell.status(), SessionStatus::Disconnected);
    assert!(shell.session_id().is_none());
    assert!(!open.load(Ordering::SeqCst));
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Error { .. }
    ));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Disconnected);

    // Later chunks stay local and the proxy is not told to disconnect.
    assert!(matches!(
        shell.send_audio(vec![0u8; 8]).await.unwrap_err(),
        SessionError::NotConnected
    ));
    assert_eq!(calls.audio.load(Ordering::SeqCst), 1);
    assert_eq!(calls.disconnect.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn lost_proxy_session_during_a_tool_call_disconnects_the_shell() {
    let mut proxy = FakeProxy::new();
    proxy.session_lost = true;
    let shell = WidgetShell::new(proxy, FakeMic::default());
    shell.connect().await.unwrap();

    let err = shell.execute_tool("battery", json!({})).await.unwrap_err();
    assert!(matches!(err, SessionError::Transport(ref e) if e.is_session_lost()));
    assert_eq!(shell.status(), SessionStatus::Disconnected);
    assert_eq!(shell.toggle().await.unwrap(), Toggle::Connected);
}

#[tokio::test]
async fn cancelled_capture_releases_the_device_on_retry() {
    let mic = FakeMic::default();
    mic.stalled_acquires.store(1, Ordering::SeqCst);
    let releases = Arc::clone(&mic.releases);
    let open = Arc::clone(&mic.open);
    let shell = WidgetShell::new(FakeProxy::new(), mic);

    let cancelled = tokio::time::timeout(Duration::from_millis(20), shell.connect()).await;
    assert!(cancelled.is_err());
    assert_eq!(shell.status(), SessionStatus::Disconnected);

    shell.connect().await.unwrap();
    assert_eq!(shell.status(), SessionStatus::Connected);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(open.load(Ordering::SeqCst));
}

#[tokio::test]
async fn cancelled_proxy_connect_can_be_retried() {
    let proxy = FakeProxy::new();
    proxy.stalled_connects.store(1, Ordering::SeqCst);
    let calls = Arc::clone(&proxy.calls);
    let shell = WidgetShell::new(proxy, FakeMic::default());
    let mut events = shell.subscribe();

    let cancelled = tokio::time::timeout(Duration::from_millis(20), shell.connect()).await;
    assert!(cancelled.is_err());
    assert_eq!(shell.status(), SessionStatus::Disconnected);
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Disconnected);

    assert_eq!(shell.toggle().await.unwrap(), Toggle::Connected);
    assert_eq!(calls.connect.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cancelled_disconnect_still_lands_disconnected() {
    let mut proxy = FakeProxy::new();
    proxy.stall_disconnect = true;
    let mic = FakeMic::default();
    let open = Arc::clone(&mic.open);
    let shell = WidgetShell::new(proxy, mic);
    shell.connect().await.unwrap();
    let mut events = shell.subscribe();

    let cancelled = tokio::time::timeout(Duration::from_millis(20), shell.disconnect()).await;
    assert!(cancelled.is_err());
    assert_eq!(shell.status(), SessionStatus::Disconnected);
    assert!(shell.session_id().is_none());
    assert!(!open.load(Ordering::SeqCst));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Disconnected);
}
