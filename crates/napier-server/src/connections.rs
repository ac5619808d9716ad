//! In-memory table of active proxy sessions, keyed by client id.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One client's proxy session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySession {
    pub session_id: String,
    /// API key the session was opened with. Only callers presenting the
    /// same key (or, for keyless sessions, no key) may use the session.
    pub api_key_id: Option<i64>,
}

impl ProxySession {
    pub fn is_owned_by(&self, api_key_id: Option<i64>) -> bool {
        self.api_key_id == api_key_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("client id is held by another API key")]
    HeldByOtherKey,
}

/// Active sessions. Cloning shares the same table.
///
/// Not persisted: every session is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTable {
    sessions: Arc<RwLock<HashMap<String, ProxySession>>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the client's session, creating it if absent.
    ///
    /// Runs under a single write lock, so concurrent connects for one client
    /// id all observe the same session id. A session opened under a different
    /// key is left alone.
    pub async fn connect_or_get(
        &self,
        client_id: &str,
        api_key_id: Option<i64>,
    ) -> Result<ProxySession, ConnectionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(client_id.to_string())
            .or_insert_with(|| ProxySession {
                session_id: new_session_id(),
                api_key_id,
            });
        if !session.is_owned_by(api_key_id) {
            return Err(ConnectionError::HeldByOtherKey);
        }
        Ok(session.clone())
    }

    /// Removes the client's session if `api_key_id` owns it. Returns `false`
    /// if nothing was removed.
    pub async fn disconnect(&self, client_id: &str, api_key_id: Option<i64>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(client_id) {
            Some(session) if session.is_owned_by(api_key_id) => {
                sessions.remove(client_id);
                true
            }
            _ => false,
        }
    }

    /// The client's session, if one exists and `api_key_id` owns it.
    pub async fn session_for(
        &self,
        client_id: &str,
        api_key_id: Option<i64>,
    ) -> Option<ProxySession> {
        self.sessions
            .read()
            .await
            .get(client_id)
            .filter(|s| s.is_owned_by(api_key_id))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn new_session_id() -> String {
    format!("session_{}", Uuid::new_v4().simple())
}
