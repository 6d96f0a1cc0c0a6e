use std::collections::HashMap;
use std::time::Duration;

use rusqlite::params;

use super::SharedConnection;
use crate::poll::{PollInfo, PollStore, now_unix};
use crate::store::{StoreError, decode_hex};

/// Peer capability table, normalized into `poll_info` plus a one-to-many
/// `poll_info_assets`. An update replaces both inside one transaction so
/// readers never see an entry with half its assets.
#[derive(Clone)]
pub struct SqlitePollStore {
    conn: SharedConnection,
}

impl SqlitePollStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl PollStore for SqlitePollStore {
    fn update(&self, peer_id: &str, info: PollInfo) -> Result<(), StoreError> {
        let peer_node_id = decode_hex("peer node id", peer_id)?;

        let mut conn = self.conn.lock().expect("connection mutex poisoned");
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM poll_info_assets WHERE peer_node_id = ?1",
            params![peer_node_id],
        )?;
        tx.execute(
            "DELETE FROM poll_info WHERE peer_node_id = ?1",
            params![peer_node_id],
        )?;
        tx.execute(
            r#"
INSERT INTO poll_info (peer_node_id, protocol_version, peer_allowed, last_seen)
VALUES (?1, ?2, ?3, ?4)
"#,
            params![
                peer_node_id,
                info.protocol_version as i64,
                info.peer_allowed,
                info.last_seen,
            ],
        )?;
        for asset in &info.assets {
            tx.execute(
                "INSERT INTO poll_info_assets (peer_node_id, asset) VALUES (?1, ?2)",
                params![peer_node_id, asset],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_all(&self) -> Result<HashMap<String, PollInfo>, StoreError> {
        let conn = self.conn.lock().expect("connection mutex poisoned");
        let mut stmt = conn.prepare(
            r#"
SELECT i.peer_node_id
,      i.protocol_version
,      i.peer_allowed
,      i.last_seen
,      a.asset
FROM poll_info i
LEFT JOIN poll_info_assets a ON i.peer_node_id = a.peer_node_id
ORDER BY i.peer_node_id, a.asset
"#,
        )?;
        let rows = stmt.query_map([], |row| {
            let peer: Vec<u8> = row.get(0)?;
            let protocol_version: i64 = row.get(1)?;
            let peer_allowed: bool = row.get(2)?;
            let last_seen: i64 = row.get(3)?;
            // NULL for peers that advertised no assets.
            let asset: Option<String> = row.get(4)?;
            Ok((hex::encode(peer), protocol_version, peer_allowed, last_seen, asset))
        })?;

        let mut out: HashMap<String, PollInfo> = HashMap::new();
        for row in rows {
            let (peer, protocol_version, peer_allowed, last_seen, asset) = row?;
            let entry = out.entry(peer).or_insert(PollInfo {
                protocol_version: protocol_version as u64,
                assets: Vec::new(),
                peer_allowed,
                last_seen,
            });
            if let Some(asset) = asset {
                entry.assets.push(asset);
            }
        }
        Ok(out)
    }

    fn remove_unseen(&self, older_than: Duration) -> Result<(), StoreError> {
        let cutoff = now_unix() - older_than.as_secs() as i64;

        let mut conn = self.conn.lock().expect("connection mutex poisoned");
        let tx = conn.transaction()?;

        tx.execute(
            r#"
DELETE FROM poll_info_assets WHERE peer_node_id IN (
  SELECT peer_node_id FROM poll_info WHERE last_seen < ?1
)
"#,
            params![cutoff],
        )?;
        tx.execute("DELETE FROM poll_info WHERE last_seen < ?1", params![cutoff])?;

        tx.commit()?;
        Ok(())
    }
}
