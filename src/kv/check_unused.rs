//! Startup guard for the migration off the key-value backend: the sqlite
//! era must not begin while the deprecated database still holds in-flight
//! swaps, because nothing in the new era can resolve them.

use std::fmt;
use std::path::Path;

use redb::{Database, ReadableTable as _, TableError};

use crate::store::StoreError;
use crate::swap::SwapStateMachine;

use super::swap_store::SWAPS_TABLE;
use super::version_store::{VERSION_KEY, VERSION_TABLE};

/// File name of the deprecated database inside the data directory.
pub const LEGACY_DB_FILE: &str = "swaps";

/// Outcome of the legacy check when startup may proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyCheck {
    /// No legacy database present; nothing to drain.
    Absent,
    /// Legacy database exists and every swap in it is resolved.
    NoActiveSwaps,
    /// Legacy database could not be opened or read; assumed drained.
    /// The reason is kept so operators can still see the degraded path.
    Unreadable(String),
}

/// Active swaps were positively confirmed in the legacy database; startup
/// must halt until the operator drains them on the old release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySwapsError {
    pub stored_version: Option<String>,
}

impl fmt::Display for LegacySwapsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stored_version {
            Some(version) => write!(
                f,
                "active swaps in deprecated key-value database with version '{version}'. \
                 Run that version to resolve these swaps before upgrading"
            ),
            None => write!(
                f,
                "active swaps in deprecated key-value database with unknown version. \
                 Run the previous release to resolve these swaps before upgrading"
            ),
        }
    }
}

impl std::error::Error for LegacySwapsError {}

/// Checks that the deprecated key-value database in `data_dir`, if any, no
/// longer holds active swaps.
///
/// Best-effort by design: an unopenable or unparsable legacy file degrades
/// to [`LegacyCheck::Unreadable`] and startup continues. The check only
/// fails when an active swap is positively confirmed. The legacy file is
/// never written to; every access is a read transaction.
pub fn check_unused(data_dir: &Path) -> Result<LegacyCheck, LegacySwapsError> {
    let path = data_dir.join(LEGACY_DB_FILE);
    if !path.exists() {
        return Ok(LegacyCheck::Absent);
    }

    let db = match Database::open(&path) {
        Ok(db) => db,
        Err(err) => {
            tracing::info!(
                path = %path.display(),
                error = %err,
                "failed to open deprecated key-value database, assuming no active swaps"
            );
            return Ok(LegacyCheck::Unreadable(err.to_string()));
        }
    };

    let active = match legacy_has_active_swaps(&db) {
        Ok(active) => active,
        Err(err) => {
            tracing::info!(
                path = %path.display(),
                error = %err,
                "failed to scan deprecated key-value database, assuming no active swaps"
            );
            return Ok(LegacyCheck::Unreadable(err.to_string()));
        }
    };

    if !active {
        return Ok(LegacyCheck::NoActiveSwaps);
    }

    let stored_version = legacy_version(&db);
    match &stored_version {
        Some(version) => tracing::info!(
            %version,
            "found active swaps in deprecated key-value database, \
             run that version to resolve them before upgrading"
        ),
        None => tracing::info!(
            "found active swaps in deprecated key-value database with unknown version, \
             run the previous release to resolve them before upgrading"
        ),
    }

    Err(LegacySwapsError { stored_version })
}

fn legacy_has_active_swaps(db: &Database) -> Result<bool, StoreError> {
    let tx = db.begin_read()?;
    let table = match tx.open_table(SWAPS_TABLE) {
        Ok(table) => table,
        // A database that never stored swaps has nothing to drain.
        Err(TableError::TableDoesNotExist(_)) => return Ok(false),
        Err(err) => return Err(err.into()),
    };

    for item in table.iter()? {
        let (_, value) = item?;
        let swap: SwapStateMachine = serde_json::from_slice(value.value())?;
        if !swap.is_finished() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Version tag of the legacy database, best-effort.
fn legacy_version(db: &Database) -> Option<String> {
    let tx = db.begin_read().ok()?;
    let table = tx.open_table(VERSION_TABLE).ok()?;
    let guard = table.get(VERSION_KEY).ok()??;
    Some(String::from_utf8_lossy(guard.value()).into_owned())
}
