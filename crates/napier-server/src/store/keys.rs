//! API keys.
//!
//! Only the SHA-256 digest of a key is stored, next to a short display
//! prefix. Raw keys are shown once, at creation.

use super::StoreError;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

/// Every generated key starts with this marker.
pub const KEY_PREFIX: &str = "nk_";

/// Characters of the raw key kept in clear for display.
const DISPLAY_PREFIX_LEN: usize = 10;

/// An active key that matched a presented secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedKey {
    pub key_id: i64,
    pub user_id: i64,
    /// The owning user's key for the upstream voice service, if any.
    pub upstream_api_key: Option<String>,
}

pub fn hash_key(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Returns a fresh random key: `nk_` followed by 64 hex characters.
pub fn generate_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", KEY_PREFIX, hex::encode(bytes))
}

fn display_prefix(raw: &str) -> String {
    raw.chars().take(DISPLAY_PREFIX_LEN).collect()
}

/// Stores `raw` as a key for `user_id`. Returns the key id.
pub fn insert_key(
    conn: &Connection,
    user_id: i64,
    raw: &str,
    name: Option<&str>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO api_keys (user_id, key_hash, key_prefix, name) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, hash_key(raw), display_prefix(raw), name],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Generates and stores a new key. Returns `(key_id, raw_key)`.
pub fn create_key(
    conn: &Connection,
    user_id: i64,
    name: Option<&str>,
) -> Result<(i64, String), StoreError> {
    let raw = generate_key();
    let id = insert_key(conn, user_id, &raw, name)?;
    Ok((id, raw))
}

/// Looks up an active key by its raw value and stamps `last_used_at`.
///
/// Returns `Ok(None)` for unknown or revoked keys.
pub fn validate_key(conn: &Connection, raw: &str) -> Result<Option<ValidatedKey>, StoreError> {
    let found = conn
        .query_row(
            "SELECT k.id, k.user_id, u.upstream_api_key
             FROM api_keys k JOIN users u ON u.id = k.user_id
             WHERE k.key_hash = ?1 AND k.active = 1",
            params![hash_key(raw)],
            |row| {
                Ok(ValidatedKey {
                    key_id: row.get(0)?,
                    user_id: row.get(1)?,
                    upstream_api_key: row.get(2)?,
                })
            },
        )
        .optional()?;

    if let Some(key) = &found {
        conn.execute(
            "UPDATE api_keys SET last_used_at = datetime('now') WHERE id = ?1",
            params![key.key_id],
        )?;
    }
    Ok(found)
}

/// Deactivates a key. Returns `false` if no active key had that id.
pub fn revoke_key(conn: &Connection, key_id: i64) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE api_keys SET active = 0 WHERE id = ?1 AND active = 1",
        params![key_id],
    )?;
    Ok(changed > 0)
}

/// Makes sure `raw` is a usable key, creating an owner named `owner` if
/// needed. Returns the key id.
pub fn ensure_key(conn: &Connection, raw: &str, owner: &str) -> Result<i64, StoreError> {
    let existing: Option<(i64, bool)> = conn
        .query_row(
            "SELECT id, active FROM api_keys WHERE key_hash = ?1",
            params![hash_key(raw)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match existing {
        Some((id, true)) => Ok(id),
        Some((id, false)) => {
            conn.execute("UPDATE api_keys SET active = 1 WHERE id = ?1", params![id])?;
            Ok(id)
        }
        None => {
            let user_id = super::create_user(conn, owner, None)?;
            insert_key(conn, user_id, raw, Some("bootstrap"))
        }
    }
}
