//! Relational backend on sqlite. One database file carries every store;
//! each store holds the shared connection and acquires its own statements
//! and transactions.

pub mod migrations;

mod poll_store;
mod requested_swap_store;
mod swap_store;
mod version_store;

pub use poll_store::SqlitePollStore;
pub use requested_swap_store::SqliteRequestedSwapStore;
pub use swap_store::SqliteSwapStore;
pub use version_store::SqliteVersionStore;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context as _, Result};
use rusqlite::Connection;

/// All stores built on the same backend instance share one handle; sqlite
/// serializes writers through it.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Opens (creating if needed) the database, configures it and brings the
/// schema to the latest migration.
pub fn open_database(path: &Path) -> Result<SharedConnection> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create database dir {}", dir.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open sqlite {}", path.display()))?;
    conn.busy_timeout(Duration::from_secs(5))
        .context("set sqlite busy_timeout")?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
        .context("configure sqlite pragmas")?;

    migrations::migrate(&mut conn).context("migrate sqlite schema")?;

    Ok(Arc::new(Mutex::new(conn)))
}
