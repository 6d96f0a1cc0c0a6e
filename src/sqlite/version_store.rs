use rusqlite::{OptionalExtension as _, params};

use super::SharedConnection;
use crate::store::StoreError;
use crate::version::VersionStore;

/// Single-row version tag, overwritten in place.
#[derive(Clone)]
pub struct SqliteVersionStore {
    conn: SharedConnection,
}

impl SqliteVersionStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl VersionStore for SqliteVersionStore {
    fn get_version(&self) -> Result<String, StoreError> {
        let conn = self.conn.lock().expect("connection mutex poisoned");
        conn.query_row("SELECT version FROM version WHERE id = 0", [], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or(StoreError::DoesNotExist)
    }

    fn set_version(&self, version: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("connection mutex poisoned");
        conn.execute(
            r#"
INSERT INTO version (id, version) VALUES (0, ?1)
ON CONFLICT(id) DO UPDATE SET version = excluded.version
"#,
            params![version],
        )?;
        Ok(())
    }
}
