use std::collections::HashMap;

use rusqlite::types::Type;
use rusqlite::{Row, params};

use super::SharedConnection;
use crate::store::{StoreError, decode_hex};
use crate::swap::{RequestedSwap, RequestedSwapStore, SwapType};

/// Append-only request ledger: one row per request, never updated or
/// deleted. Entries are immutable, so the deterministic (asset, type,
/// amount) ordering is for display only.
#[derive(Clone)]
pub struct SqliteRequestedSwapStore {
    conn: SharedConnection,
}

impl SqliteRequestedSwapStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl RequestedSwapStore for SqliteRequestedSwapStore {
    fn add(&self, peer_id: &str, entry: RequestedSwap) -> Result<(), StoreError> {
        let peer_node_id = decode_hex("peer node id", peer_id)?;

        let conn = self.conn.lock().expect("connection mutex poisoned");
        conn.execute(
            r#"
INSERT INTO requested_swaps (peer_node_id, asset, amount_sat, type, rejection_reason)
VALUES (?1, ?2, ?3, ?4, ?5)
"#,
            params![
                peer_node_id,
                &entry.asset,
                entry.amount_sat as i64,
                entry.swap_type.as_i64(),
                &entry.rejection_reason,
            ],
        )?;
        Ok(())
    }

    fn get(&self, peer_id: &str) -> Result<Vec<RequestedSwap>, StoreError> {
        let peer_node_id = decode_hex("peer node id", peer_id)?;

        let conn = self.conn.lock().expect("connection mutex poisoned");
        let mut stmt = conn.prepare(
            r#"
SELECT asset, amount_sat, type, rejection_reason
FROM requested_swaps
WHERE peer_node_id = ?1
ORDER BY asset, type, amount_sat
"#,
        )?;
        let rows = stmt.query_map(params![peer_node_id], |row| row_to_requested(row, 0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn get_all(&self) -> Result<HashMap<String, Vec<RequestedSwap>>, StoreError> {
        let conn = self.conn.lock().expect("connection mutex poisoned");
        let mut stmt = conn.prepare(
            r#"
SELECT peer_node_id, asset, amount_sat, type, rejection_reason
FROM requested_swaps
ORDER BY peer_node_id, asset, type, amount_sat
"#,
        )?;
        let rows = stmt.query_map([], |row| {
            let peer: Vec<u8> = row.get(0)?;
            Ok((hex::encode(peer), row_to_requested(row, 1)?))
        })?;

        let mut out: HashMap<String, Vec<RequestedSwap>> = HashMap::new();
        for row in rows {
            let (peer, entry) = row?;
            out.entry(peer).or_default().push(entry);
        }
        Ok(out)
    }
}

fn row_to_requested(row: &Row<'_>, offset: usize) -> rusqlite::Result<RequestedSwap> {
    let amount_sat: i64 = row.get(offset + 1)?;
    let amount_sat = u64::try_from(amount_sat).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            offset + 1,
            Type::Integer,
            format!("invalid amount_sat {amount_sat}").into(),
        )
    })?;

    let swap_type: i64 = row.get(offset + 2)?;
    let swap_type = SwapType::from_i64(swap_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            offset + 2,
            Type::Integer,
            format!("unknown swap type {swap_type}").into(),
        )
    })?;

    Ok(RequestedSwap {
        asset: row.get(offset)?,
        amount_sat,
        swap_type,
        rejection_reason: row.get(offset + 3)?,
    })
}
