//! Database layer for the Napier proxy.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations for the proxy's store: users, API keys,
//! agents with their tool definitions, and the usage log.
//!
//! Active proxy sessions are deliberately *not* stored here; they live in
//! memory and are lost on restart.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
