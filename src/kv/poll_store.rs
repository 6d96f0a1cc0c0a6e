use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use redb::{Database, ReadableTable as _, TableDefinition};

use crate::poll::{PollInfo, PollStore, now_unix};
use crate::store::{StoreError, decode_hex};

const POLL_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("poll-list");

pub struct KvPollStore {
    db: Arc<Database>,
}

impl KvPollStore {
    pub fn new(db: Arc<Database>) -> Result<Self, StoreError> {
        let tx = db.begin_write()?;
        tx.open_table(POLL_TABLE)?;
        tx.commit()?;
        Ok(Self { db })
    }
}

impl PollStore for KvPollStore {
    fn update(&self, peer_id: &str, info: PollInfo) -> Result<(), StoreError> {
        let key = decode_hex("peer node id", peer_id)?;
        let value = serde_json::to_vec(&info)?;

        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(POLL_TABLE)?;
            table.insert(key.as_slice(), value.as_slice())?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_all(&self) -> Result<HashMap<String, PollInfo>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(POLL_TABLE)?;

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

    fn remove_unseen(&self, older_than: Duration) -> Result<(), StoreError> {
        // One "now" for the whole sweep.
        let cutoff = now_unix() - older_than.as_secs() as i64;

        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(POLL_TABLE)?;

            let mut stale = Vec::new();
            for item in table.iter()? {
                let (key, value) = item?;
                let info: PollInfo = serde_json::from_slice(value.value())?;
                if info.last_seen < cutoff {
                    stale.push(key.value().to_vec());
                }
            }

            for key in stale {
                table.remove(key.as_slice())?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
