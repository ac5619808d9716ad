//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time and applied in order,
//! each inside its own transaction. Applied names are tracked in
//! `_napier_migrations`.

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_users",
        sql: include_str!("migrations/001_users.sql"),
    },
    Migration {
        name: "002_api_keys",
        sql: include_str!("migrations/002_api_keys.sql"),
    },
    Migration {
        name: "003_agents",
        sql: include_str!("migrations/003_agents.sql"),
    },
    Migration {
        name: "004_usage_log",
        sql: include_str!("migrations/004_usage_log.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Runs all pending migrations and returns how many were applied.
///
/// # Errors
///
/// Returns `MigrationError` if any migration fails to execute or if the
/// tracking table cannot be queried. A failed migration leaves no partial
/// schema behind.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    // The tracking table must exist before the first lookup.
    conn.execute_batch(MIGRATIONS[0].sql)
        .map_err(execution_failed("_napier_migrations_bootstrap"))?;

    let mut applied = 0;

    for migration in migrations {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _napier_migrations WHERE name = ?1",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;

        if already_applied {
            tracing::debug!(migration = migration.name, "migration already applied");
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");

        let tx = conn
            .unchecked_transaction()
            .map_err(execution_failed(migration.name))?;
        tx.execute_batch(migration.sql)
            .map_err(execution_failed(migration.name))?;
        tx.execute(
            "INSERT INTO _napier_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(execution_failed(migration.name))?;
        tx.commit().map_err(execution_failed(migration.name))?;

        applied += 1;
    }

    Ok(applied)
}

fn execution_failed(name: &str) -> impl FnOnce(rusqlite::Error) -> MigrationError {
    let name = name.to_string();
    move |source| MigrationError::ExecutionFailed { name, source }
}
