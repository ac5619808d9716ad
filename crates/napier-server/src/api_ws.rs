//! WebSocket channel: clients register their id and get an acknowledgement.

use crate::api::log_usage;
use crate::store::usage::UsageAction;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use napier_types::{WsIncoming, WsOutgoing};
use std::{net::SocketAddr, sync::Arc};

/// Handler for `GET /ws`.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    tracing::debug!(remote_addr = %addr, "websocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();
    let mut registered: Option<String> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let reply = match serde_json::from_str::<WsIncoming>(text.as_str()) {
            Ok(WsIncoming::Register { client_id }) if !client_id.trim().is_empty() => {
                tracing::info!(client_id = %client_id, remote_addr = %addr, "websocket client registered");
                log_usage(&state, None, Some(&client_id), UsageAction::Register, "ok").await;
                registered = Some(client_id);
                WsOutgoing::Registered { success: true }
            }
            Ok(WsIncoming::Register { .. }) => WsOutgoing::Error {
                message: crate::api::MISSING_CLIENT_ID.to_string(),
            },
            Err(e) => {
                tracing::debug!(remote_addr = %addr, "unreadable websocket frame: {}", e);
                WsOutgoing::Error {
                    message: format!("invalid message: {}", e),
                }
            }
        };

        let frame = match serde_json::to_string(&reply) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("failed to encode websocket reply: {}", e);
                continue;
            }
        };
        if sender.send(Message::Text(frame.into())).await.is_err() {
            break;
        }
    }

    tracing::info!(
        client_id = registered.as_deref().unwrap_or("<unregistered>"),
        remote_addr = %addr,
        "websocket closed"
    );
}
