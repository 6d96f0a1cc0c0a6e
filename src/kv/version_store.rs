use std::sync::Arc;

use redb::{Database, ReadableTable as _, TableDefinition};

use crate::store::StoreError;
use crate::version::VersionStore;

pub(crate) const VERSION_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("version");

pub(crate) const VERSION_KEY: &str = "version";

/// Single version tag under a fixed key.
pub struct KvVersionStore {
    db: Arc<Database>,
}

impl KvVersionStore {
    pub fn new(db: Arc<Database>) -> Result<Self, StoreError> {
        let tx = db.begin_write()?;
        tx.open_table(VERSION_TABLE)?;
        tx.commit()?;
        Ok(Self { db })
    }
}

impl VersionStore for KvVersionStore {
    fn get_version(&self) -> Result<String, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(VERSION_TABLE)?;
        match table.get(VERSION_KEY)? {
            Some(guard) => Ok(String::from_utf8_lossy(guard.value()).into_owned()),
            None => Err(StoreError::DoesNotExist),
        }
    }

    fn set_version(&self, version: &str) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(VERSION_TABLE)?;
            table.insert(VERSION_KEY, version.as_bytes())?;
        }
        tx.commit()?;
        Ok(())
    }
}
