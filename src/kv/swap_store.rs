use std::sync::Arc;

use redb::{Database, ReadableTable as _, TableDefinition};

use crate::store::{StoreError, decode_hex};
use crate::swap::{SwapId, SwapStateMachine, SwapStore};

pub(crate) const SWAPS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("swaps");

/// Swap records keyed by the raw 32 bytes of the swap id.
pub struct KvSwapStore {
    db: Arc<Database>,
}

impl KvSwapStore {
    pub fn new(db: Arc<Database>) -> Result<Self, StoreError> {
        let tx = db.begin_write()?;
        tx.open_table(SWAPS_TABLE)?;
        tx.commit()?;
        Ok(Self { db })
    }
}

impl SwapStore for KvSwapStore {
    fn update_data(&self, s: &SwapStateMachine) -> Result<(), StoreError> {
        let value = serde_json::to_vec(s)?;

        // A single write transaction covers create and update: insert
        // overwrites in place, so two racing creators cannot interleave.
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(SWAPS_TABLE)?;
            table.insert(s.swap_id.as_bytes().as_slice(), value.as_slice())?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_data(&self, id: &str) -> Result<SwapStateMachine, StoreError> {
        let swap_id: SwapId = id.parse()?;

        let tx = self.db.begin_read()?;
        let table = tx.open_table(SWAPS_TABLE)?;
        match table.get(swap_id.as_bytes().as_slice())? {
            Some(guard) => Ok(serde_json::from_slice(guard.value())?),
            None => Err(StoreError::DataNotAvailable),
        }
    }

    fn list_all(&self) -> Result<Vec<SwapStateMachine>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(SWAPS_TABLE)?;

        let mut out = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    fn list_all_by_peer(&self, peer: &str) -> Result<Vec<SwapStateMachine>, StoreError> {
        // Same decode contract as the relational backend.
        decode_hex("peer node id", peer)?;

        let mut out = self.list_all()?;
        out.retain(|s: &SwapStateMachine| s.data.peer_node_id == peer);
        Ok(out)
    }
}
