//! Persistent proxy records: users, API keys, agents and the usage log.
//!
//! Every function takes a borrowed [`rusqlite::Connection`] and performs
//! blocking I/O; async callers run them inside `spawn_blocking`.

pub mod agents;
pub mod keys;
pub mod usage;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("stored tool parameters are not valid JSON: {0}")]
    InvalidParameters(#[from] serde_json::Error),
}

/// Creates an account that owns keys and agents. Returns the user id.
pub fn create_user(
    conn: &rusqlite::Connection,
    name: &str,
    upstream_api_key: Option<&str>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO users (name, upstream_api_key) VALUES (?1, ?2)",
        rusqlite::params![name, upstream_api_key],
    )?;
    Ok(conn.last_insert_rowid())
}
