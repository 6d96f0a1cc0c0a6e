//! Swap data model and the store contracts both backends implement.
//!
//! The state machine driving a swap lives in the swap engine outside this
//! crate; this module only defines the shape that gets persisted after
//! every transition, plus the append-only requested-swap ledger.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use hex::FromHex as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::store::StoreError;

/// Terminal state labels. A swap whose current state is one of these is
/// resolved: it no longer locks funds and does not block upgrades.
pub const STATE_CLAIMED_PREIMAGE: &str = "claimed_preimage";
pub const STATE_CLAIMED_CLTV: &str = "claimed_cltv";
pub const STATE_CANCELED: &str = "canceled";

pub fn is_finished_state(state: &str) -> bool {
    matches!(
        state,
        STATE_CLAIMED_PREIMAGE | STATE_CLAIMED_CLTV | STATE_CANCELED
    )
}

/// 32-byte swap identifier, rendered as 64 lowercase hex characters.
/// Immutable once created; the primary key of every swap store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapId([u8; 32]);

impl SwapId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for SwapId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = <[u8; 32]>::from_hex(s).map_err(|source| StoreError::Decode {
            what: "swap id",
            input: s.to_string(),
            source,
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for SwapId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SwapId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Swap-in means the initiator pays on-chain to move channel balance to
/// their side; swap-out means the initiator pays an invoice to move it to
/// the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapType {
    SwapIn,
    SwapOut,
}

impl SwapType {
    pub fn as_i64(self) -> i64 {
        match self {
            SwapType::SwapIn => 0,
            SwapType::SwapOut => 1,
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(SwapType::SwapIn),
            1 => Some(SwapType::SwapOut),
            _ => None,
        }
    }
}

impl fmt::Display for SwapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapType::SwapIn => f.write_str("swap in"),
            SwapType::SwapOut => f.write_str("swap out"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapRole {
    Maker,
    Taker,
}

impl SwapRole {
    pub fn as_i64(self) -> i64 {
        match self {
            SwapRole::Maker => 0,
            SwapRole::Taker => 1,
        }
    }

    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(SwapRole::Maker),
            1 => Some(SwapRole::Taker),
            _ => None,
        }
    }
}

impl fmt::Display for SwapRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapRole::Maker => f.write_str("maker"),
            SwapRole::Taker => f.write_str("taker"),
        }
    }
}

/// Everything the swap engine needs back after a restart. Node ids,
/// preimages and transaction ids are hex strings; the per-swap private key
/// and the pending outbound message are raw bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapData {
    pub peer_node_id: String,
    pub initiator_node_id: String,
    pub created_at: i64,
    pub privkey_bytes: Vec<u8>,
    pub fee_preimage: String,
    pub opening_tx_fee: u64,
    pub opening_tx_hex: String,
    pub starting_block_height: u32,
    pub claim_tx_id: String,
    pub claim_payment_hash: String,
    pub claim_preimage: String,
    pub blinding_key_hex: String,
    pub next_message: Vec<u8>,
    pub next_message_type: u32,
    pub last_err_string: String,
}

// The private key must never end up in logs.
impl fmt::Debug for SwapData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapData")
            .field("peer_node_id", &self.peer_node_id)
            .field("initiator_node_id", &self.initiator_node_id)
            .field("created_at", &self.created_at)
            .field("privkey_bytes", &"<redacted>")
            .field("opening_tx_fee", &self.opening_tx_fee)
            .field("starting_block_height", &self.starting_block_height)
            .field("claim_tx_id", &self.claim_tx_id)
            .field("claim_payment_hash", &self.claim_payment_hash)
            .field("next_message_type", &self.next_message_type)
            .field("last_err_string", &self.last_err_string)
            .finish_non_exhaustive()
    }
}

/// Persisted snapshot of one swap: the last two state labels plus the data
/// the engine needs to resume. One record per swap id, written whole on
/// every transition, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapStateMachine {
    pub swap_id: SwapId,
    #[serde(rename = "type")]
    pub swap_type: SwapType,
    pub role: SwapRole,
    pub previous: String,
    pub current: String,
    pub data: SwapData,
}

impl SwapStateMachine {
    pub fn is_finished(&self) -> bool {
        is_finished_state(&self.current)
    }
}

/// Durable store for swap state machines.
///
/// `update_data` persists the full record, creating it when absent, inside
/// a single transaction. `get_data` fails with
/// [`StoreError::DataNotAvailable`] for unknown ids. Records are never
/// deleted; terminal swaps stay for `list_all` history.
pub trait SwapStore {
    fn update_data(&self, s: &SwapStateMachine) -> Result<(), StoreError>;
    fn get_data(&self, id: &str) -> Result<SwapStateMachine, StoreError>;
    fn list_all(&self) -> Result<Vec<SwapStateMachine>, StoreError>;
    fn list_all_by_peer(&self, peer: &str) -> Result<Vec<SwapStateMachine>, StoreError>;

    /// True while any persisted swap is in a non-terminal state.
    fn has_active_swaps(&self) -> Result<bool, StoreError> {
        Ok(self.list_all()?.iter().any(|s| !s.is_finished()))
    }
}

/// One audit entry per incoming swap request, including rejections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedSwap {
    pub asset: String,
    pub amount_sat: u64,
    pub swap_type: SwapType,
    /// Empty when the request was accepted.
    pub rejection_reason: String,
}

/// Append-only per-peer request ledger. No update or delete exists by
/// design; this is the forensic trail of swap requests.
pub trait RequestedSwapStore {
    fn add(&self, peer_id: &str, entry: RequestedSwap) -> Result<(), StoreError>;
    fn get(&self, peer_id: &str) -> Result<Vec<RequestedSwap>, StoreError>;
    fn get_all(&self) -> Result<HashMap<String, Vec<RequestedSwap>>, StoreError>;
}
