//! Key-value backend on redb. One named table per store, keyed by the raw
//! bytes of the hex identifiers, values as JSON snapshots of the full
//! record.
//!
//! This is the deprecated backend: new deployments run sqlite, and
//! [`check_unused`] guards startup against a legacy file that still holds
//! in-flight swaps.

pub mod check_unused;

mod poll_store;
mod requested_swap_store;
mod swap_store;
mod version_store;

pub use check_unused::{LEGACY_DB_FILE, LegacyCheck, LegacySwapsError, check_unused};
pub use poll_store::KvPollStore;
pub use requested_swap_store::KvRequestedSwapStore;
pub use swap_store::KvSwapStore;
pub use version_store::KvVersionStore;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use redb::Database;

/// Opens (creating if needed) the key-value database shared by every store
/// built on this backend instance.
pub fn open_database(path: &Path) -> Result<Arc<Database>> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create database dir {}", dir.display()))?;
    }

    let db = Database::create(path)
        .with_context(|| format!("open key-value database {}", path.display()))?;
    Ok(Arc::new(db))
}
