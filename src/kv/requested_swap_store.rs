use std::collections::HashMap;
use std::sync::Arc;

use redb::{Database, ReadableTable as _, TableDefinition};

use crate::store::{StoreError, decode_hex};
use crate::swap::{RequestedSwap, RequestedSwapStore};

const REQUESTED_SWAPS_TABLE: TableDefinition<&[u8], &[u8]> =
    TableDefinition::new("requested-swaps");

/// Per-peer request history as a JSON list the append happens into; the
/// read-modify-write runs inside one write transaction.
pub struct KvRequestedSwapStore {
    db: Arc<Database>,
}

impl KvRequestedSwapStore {
    pub fn new(db: Arc<Database>) -> Result<Self, StoreError> {
        let tx = db.begin_write()?;
        tx.open_table(REQUESTED_SWAPS_TABLE)?;
        tx.commit()?;
        Ok(Self { db })
    }
}

impl RequestedSwapStore for KvRequestedSwapStore {
    fn add(&self, peer_id: &str, entry: RequestedSwap) -> Result<(), StoreError> {
        let key = decode_hex("peer node id", peer_id)?;

        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(REQUESTED_SWAPS_TABLE)?;
            let mut entries: Vec<RequestedSwap> = match table.get(key.as_slice())? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => Vec::new(),
            };
            entries.push(entry);
            let value = serde_json::to_vec(&entries)?;
            table.insert(key.as_slice(), value.as_slice())?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get(&self, peer_id: &str) -> Result<Vec<RequestedSwap>, StoreError> {
        let key = decode_hex("peer node id", peer_id)?;

        let tx = self.db.begin_read()?;
        let table = tx.open_table(REQUESTED_SWAPS_TABLE)?;
        match table.get(key.as_slice())? {
            Some(guard) => Ok(serde_json::from_slice(guard.value())?),
            None => Ok(Vec::new()),
        }
    }

    fn get_all(&self) -> Result<HashMap<String, Vec<RequestedSwap>>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(REQUESTED_SWAPS_TABLE)?;

        let mut out = HashMap::new();
        for item in table.iter()? {
            let (key, value) = item?;
            out.insert(
                hex::encode(key.value()),
                serde_json::from_slice(value.value())?,
            );
        }
        Ok(out)
    }
}
