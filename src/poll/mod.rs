//! Capability gossip: the data peers advertise about their swap support,
//! the per-peer liveness table, and the collaborator seams the gossip
//! service talks through.

pub mod service;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::store::StoreError;

pub use service::{PollConfig, PollService};

/// Capability gossip protocol version spoken by this build.
pub const PROTOCOL_VERSION: u64 = 1;

/// What we currently know about one peer, refreshed on every capability
/// message received from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollInfo {
    pub protocol_version: u64,
    /// Asset identifiers the peer supports swaps for.
    pub assets: Vec<String>,
    /// Whether the peer's local policy allows swaps with us, as last
    /// advertised.
    pub peer_allowed: bool,
    /// Unix seconds of the last message from this peer.
    pub last_seen: i64,
}

/// Wire payload of poll and poll-request messages. Self-describing JSON so
/// future additive fields don't break older peers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollMessage {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub peer_allowed: bool,
}

/// Per-peer capability table with TTL eviction.
pub trait PollStore: Send + Sync {
    /// Overwrites the entry for `peer_id`.
    fn update(&self, peer_id: &str, info: PollInfo) -> Result<(), StoreError>;
    /// Snapshot of every known peer.
    fn get_all(&self) -> Result<HashMap<String, PollInfo>, StoreError>;
    /// Deletes every entry whose `last_seen` is older than `now -
    /// older_than`, evaluated against a single `now` captured at call time.
    fn remove_unseen(&self, older_than: Duration) -> Result<(), StoreError>;
}

impl<T: PollStore + ?Sized> PollStore for Arc<T> {
    fn update(&self, peer_id: &str, info: PollInfo) -> Result<(), StoreError> {
        (**self).update(peer_id, info)
    }

    fn get_all(&self) -> Result<HashMap<String, PollInfo>, StoreError> {
        (**self).get_all()
    }

    fn remove_unseen(&self, older_than: Duration) -> Result<(), StoreError> {
        (**self).remove_unseen(older_than)
    }
}

pub type MessageHandler = Box<dyn Fn(&str, &str, &[u8]) -> anyhow::Result<()> + Send + Sync>;

/// Wire transport seam. Handlers receive `(peer_id, message_type_tag,
/// payload)` with the tag in the hex form of
/// [`crate::messages::to_hex_string`].
pub trait Messenger: Send + Sync {
    fn send_message(&self, peer_id: &str, payload: &[u8], message_type: u32)
    -> anyhow::Result<()>;
    fn add_message_handler(&self, handler: MessageHandler);
}

impl<T: Messenger + ?Sized> Messenger for Arc<T> {
    fn send_message(
        &self,
        peer_id: &str,
        payload: &[u8],
        message_type: u32,
    ) -> anyhow::Result<()> {
        (**self).send_message(peer_id, payload, message_type)
    }

    fn add_message_handler(&self, handler: MessageHandler) {
        (**self).add_message_handler(handler)
    }
}

/// Peers currently connected to the node.
pub trait PeerDirectory: Send + Sync {
    fn get_peers(&self) -> Vec<String>;
}

/// Local swap policy.
pub trait PolicyOracle: Send + Sync {
    fn is_peer_allowed(&self, peer_id: &str) -> bool;
}

pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
