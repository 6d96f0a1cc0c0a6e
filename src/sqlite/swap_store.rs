use rusqlite::types::Type;
use rusqlite::{OptionalExtension as _, Row, params};

use super::SharedConnection;
use crate::store::{StoreError, decode_hex};
use crate::swap::{SwapData, SwapId, SwapRole, SwapStateMachine, SwapStore, SwapType};

/// One row per swap; binary fields stored as raw bytes. The write path is
/// a single upsert statement so readers never observe a partial record and
/// two concurrent creators cannot race.
#[derive(Clone)]
pub struct SqliteSwapStore {
    conn: SharedConnection,
}

impl SqliteSwapStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

const SWAP_COLUMNS: &str = r#"
  swap_id
, type
, role
, previous_state
, current_state
, peer_node_id
, initiator_node_id
, created_at
, private_key
, fee_preimage
, opening_tx_fee
, opening_tx
, starting_block_height
, claim_tx_id
, claim_payment_hash
, claim_preimage
, blinding_key
, next_message
, next_message_type
, last_err
"#;

impl SwapStore for SqliteSwapStore {
    fn update_data(&self, s: &SwapStateMachine) -> Result<(), StoreError> {
        let peer_node_id = decode_hex("peer node id", &s.data.peer_node_id)?;
        let initiator_node_id = decode_hex("initiator node id", &s.data.initiator_node_id)?;
        let fee_preimage = decode_hex("fee preimage", &s.data.fee_preimage)?;
        let opening_tx = decode_hex("opening tx hex", &s.data.opening_tx_hex)?;
        let claim_tx_id = decode_hex("claim tx id", &s.data.claim_tx_id)?;
        let claim_payment_hash = decode_hex("claim payment hash", &s.data.claim_payment_hash)?;
        let claim_preimage = decode_hex("claim preimage", &s.data.claim_preimage)?;
        let blinding_key = decode_hex("blinding key", &s.data.blinding_key_hex)?;

        let conn = self.conn.lock().expect("connection mutex poisoned");
        conn.execute(
            r#"
INSERT INTO swaps (
  swap_id
, type
, role
, previous_state
, current_state
, peer_node_id
, initiator_node_id
, created_at
, private_key
, fee_preimage
, opening_tx_fee
, opening_tx
, starting_block_height
, claim_tx_id
, claim_payment_hash
, claim_preimage
, blinding_key
, next_message
, next_message_type
, last_err
) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)
ON CONFLICT(swap_id) DO UPDATE SET
  type = excluded.type
, role = excluded.role
, previous_state = excluded.previous_state
, current_state = excluded.current_state
, peer_node_id = excluded.peer_node_id
, initiator_node_id = excluded.initiator_node_id
, created_at = excluded.created_at
, private_key = excluded.private_key
, fee_preimage = excluded.fee_preimage
, opening_tx_fee = excluded.opening_tx_fee
, opening_tx = excluded.opening_tx
, starting_block_height = excluded.starting_block_height
, claim_tx_id = excluded.claim_tx_id
, claim_payment_hash = excluded.claim_payment_hash
, claim_preimage = excluded.claim_preimage
, blinding_key = excluded.blinding_key
, next_message = excluded.next_message
, next_message_type = excluded.next_message_type
, last_err = excluded.last_err
"#,
            params![
                s.swap_id.as_bytes().as_slice(),
                s.swap_type.as_i64(),
                s.role.as_i64(),
                &s.previous,
                &s.current,
                peer_node_id,
                initiator_node_id,
                s.data.created_at,
                &s.data.privkey_bytes,
                fee_preimage,
                s.data.opening_tx_fee as i64,
                opening_tx,
                i64::from(s.data.starting_block_height),
                claim_tx_id,
                claim_payment_hash,
                claim_preimage,
                blinding_key,
                &s.data.next_message,
                i64::from(s.data.next_message_type),
                &s.data.last_err_string,
            ],
        )?;
        Ok(())
    }

    fn get_data(&self, id: &str) -> Result<SwapStateMachine, StoreError> {
        let swap_id: SwapId = id.parse()?;

        let conn = self.conn.lock().expect("connection mutex poisoned");
        conn.query_row(
            &format!("SELECT {SWAP_COLUMNS} FROM swaps WHERE swap_id = ?1"),
            params![swap_id.as_bytes().as_slice()],
            row_to_swap,
        )
        .optional()?
        .ok_or(StoreError::DataNotAvailable)
    }

    fn list_all(&self) -> Result<Vec<SwapStateMachine>, StoreError> {
        let conn = self.conn.lock().expect("connection mutex poisoned");
        let mut stmt = conn.prepare(&format!("SELECT {SWAP_COLUMNS} FROM swaps"))?;
        let rows = stmt.query_map([], row_to_swap)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn list_all_by_peer(&self, peer: &str) -> Result<Vec<SwapStateMachine>, StoreError> {
        let peer_node_id = decode_hex("peer node id", peer)?;

        let conn = self.conn.lock().expect("connection mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {SWAP_COLUMNS} FROM swaps WHERE peer_node_id = ?1"
        ))?;
        let rows = stmt.query_map(params![peer_node_id], row_to_swap)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn row_to_swap(row: &Row<'_>) -> rusqlite::Result<SwapStateMachine> {
    let swap_id: Vec<u8> = row.get(0)?;
    let swap_id: [u8; 32] = swap_id.as_slice().try_into().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Blob,
            format!("invalid swap id length {}", swap_id.len()).into(),
        )
    })?;

    let swap_type: i64 = row.get(1)?;
    let swap_type = SwapType::from_i64(swap_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Integer,
            format!("unknown swap type {swap_type}").into(),
        )
    })?;

    let role: i64 = row.get(2)?;
    let role = SwapRole::from_i64(role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Integer,
            format!("unknown swap role {role}").into(),
        )
    })?;

    let peer_node_id: Vec<u8> = row.get(5)?;
    let initiator_node_id: Vec<u8> = row.get(6)?;
    let fee_preimage: Vec<u8> = row.get(9)?;

    let opening_tx_fee: i64 = row.get(10)?;
    let opening_tx_fee = u64::try_from(opening_tx_fee).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            Type::Integer,
            format!("invalid opening_tx_fee {opening_tx_fee}").into(),
        )
    })?;

    let opening_tx: Vec<u8> = row.get(11)?;

    let starting_block_height: i64 = row.get(12)?;
    let starting_block_height = u32::try_from(starting_block_height).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            12,
            Type::Integer,
            format!("invalid starting_block_height {starting_block_height}").into(),
        )
    })?;

    let claim_tx_id: Vec<u8> = row.get(13)?;
    let claim_payment_hash: Vec<u8> = row.get(14)?;
    let claim_preimage: Vec<u8> = row.get(15)?;
    let blinding_key: Vec<u8> = row.get(16)?;

    let next_message_type: i64 = row.get(18)?;
    let next_message_type = u32::try_from(next_message_type).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            18,
            Type::Integer,
            format!("invalid next_message_type {next_message_type}").into(),
        )
    })?;

    Ok(SwapStateMachine {
        swap_id: SwapId::from_bytes(swap_id),
        swap_type,
        role,
        previous: row.get(3)?,
        current: row.get(4)?,
        data: SwapData {
            peer_node_id: hex::encode(peer_node_id),
            initiator_node_id: hex::encode(initiator_node_id),
            created_at: row.get(7)?,
            privkey_bytes: row.get(8)?,
            fee_preimage: hex::encode(fee_preimage),
            opening_tx_fee,
            opening_tx_hex: hex::encode(opening_tx),
            starting_block_height,
            claim_tx_id: hex::encode(claim_tx_id),
            claim_payment_hash: hex::encode(claim_payment_hash),
            claim_preimage: hex::encode(claim_preimage),
            blinding_key_hex: hex::encode(blinding_key),
            next_message: row.get(17)?,
            next_message_type,
            last_err_string: row.get(19)?,
        },
    })
}
