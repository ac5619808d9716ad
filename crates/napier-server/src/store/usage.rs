//! Append-only log of proxy actions.

use super::StoreError;
use rusqlite::{params, Connection};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageAction {
    Connect,
    Disconnect,
    ProcessAudio,
    ExecuteTool,
    VoiceChat,
    Register,
}

impl UsageAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::ProcessAudio => "process_audio",
            Self::ExecuteTool => "execute_tool",
            Self::VoiceChat => "voice_chat",
            Self::Register => "register",
        }
    }
}

impl fmt::Display for UsageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the usage log.
#[derive(Debug, Clone, Copy)]
pub struct UsageEntry<'a> {
    pub api_key_id: Option<i64>,
    pub client_id: Option<&'a str>,
    pub action: UsageAction,
    /// `"ok"` or a short failure reason.
    pub outcome: &'a str,
}

pub fn record_usage(conn: &Connection, entry: &UsageEntry<'_>) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO usage_log (api_key_id, client_id, action, outcome) VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.api_key_id,
            entry.client_id,
            entry.action.as_str(),
            entry.outcome
        ],
    )?;
    Ok(())
}

/// Number of logged actions for a client, optionally restricted to one action.
pub fn count_usage(
    conn: &Connection,
    client_id: &str,
    action: Option<UsageAction>,
) -> Result<i64, StoreError> {
    let count = match action {
        Some(action) => conn.query_row(
            "SELECT COUNT(*) FROM usage_log WHERE client_id = ?1 AND action = ?2",
            params![client_id, action.as_str()],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM usage_log WHERE client_id = ?1",
            params![client_id],
            |row| row.get(0),
        )?,
    };
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_counts() {
        let conn = Connection::open_in_memory().unwrap();
        napier_db::run_migrations(&conn).unwrap();

        for action in [UsageAction::Connect, UsageAction::ExecuteTool, UsageAction::ExecuteTool] {
            record_usage(
                &conn,
                &UsageEntry {
                    api_key_id: None,
                    client_id: Some("client-a"),
                    action,
                    outcome: "ok",
                },
            )
            .unwrap();
        }

        assert_eq!(count_usage(&conn, "client-a", None).unwrap(), 3);
        assert_eq!(
            count_usage(&conn, "client-a", Some(UsageAction::ExecuteTool)).unwrap(),
            2
        );
        assert_eq!(count_usage(&conn, "client-b", None).unwrap(), 0);
    }
}
