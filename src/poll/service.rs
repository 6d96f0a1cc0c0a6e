//! Gossip service: pushes the local capability message to every known peer
//! on a timer, evicts stale peers on a second timer, and answers inbound
//! poll / poll-request messages.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::messages::{self, MESSAGE_TYPE_POLL, MESSAGE_TYPE_REQUEST_POLL};
use crate::poll::{
    Messenger, PeerDirectory, PolicyOracle, PollInfo, PollMessage, PollStore, PROTOCOL_VERSION,
    now_unix,
};

#[derive(Debug, Clone)]
pub struct PollConfig {
    /// How often the local capability message is pushed to every peer.
    pub poll_interval: Duration,
    /// How often stale entries are evicted from the poll store.
    pub prune_interval: Duration,
    /// Entries unseen for longer than this are evicted.
    pub retention: Duration,
    /// Locally supported asset identifiers, advertised as-is.
    pub assets: Vec<String>,
}

pub struct PollService<M, D, P, S> {
    cfg: PollConfig,
    store: S,
    messenger: M,
    policy: P,
    peers: D,
}

impl<M, D, P, S> PollService<M, D, P, S>
where
    M: Messenger + 'static,
    D: PeerDirectory + 'static,
    P: PolicyOracle + 'static,
    S: PollStore + 'static,
{
    pub fn new(cfg: PollConfig, store: S, messenger: M, policy: P, peers: D) -> Self {
        Self {
            cfg,
            store,
            messenger,
            policy,
            peers,
        }
    }

    /// Spawns the poll and eviction loops. Both stop within one select
    /// iteration once `shutdown` changes or its sender is dropped; the two
    /// timers run independently of each other.
    pub fn start(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> (JoinHandle<()>, JoinHandle<()>) {
        let poll_handle = {
            let svc = Arc::clone(self);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(svc.cfg.poll_interval);
                loop {
                    tokio::select! {
                        _ = tick.tick() => svc.poll_all_peers(),
                        _ = shutdown.changed() => break,
                    }
                }
            })
        };

        let prune_handle = {
            let svc = Arc::clone(self);
            let mut shutdown = shutdown;
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(svc.cfg.prune_interval);
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            if let Err(err) = svc.store.remove_unseen(svc.cfg.retention) {
                                tracing::warn!(error = %err, "poll store eviction failed");
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            })
        };

        (poll_handle, prune_handle)
    }

    /// Wires the service into the messenger's inbound dispatch. Held
    /// weakly so a dropped service does not keep the transport alive.
    pub fn register_message_handler(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.messenger
            .add_message_handler(Box::new(move |peer_id, msg_type, payload| {
                match weak.upgrade() {
                    Some(svc) => svc.handle_message(peer_id, msg_type, payload),
                    None => Ok(()),
                }
            }));
    }

    /// Sends the local capability message to one peer.
    pub fn poll(&self, peer_id: &str) -> Result<()> {
        self.send_capabilities(peer_id, MESSAGE_TYPE_POLL)
    }

    /// Asks one peer for its capabilities, advertising ours in the same
    /// message.
    pub fn request_poll(&self, peer_id: &str) -> Result<()> {
        self.send_capabilities(peer_id, MESSAGE_TYPE_REQUEST_POLL)
    }

    /// One poll tick. A send failure for one peer is logged and must not
    /// stall delivery to the others.
    pub fn poll_all_peers(&self) {
        for peer in self.peers.get_peers() {
            if let Err(err) = self.poll(&peer) {
                tracing::warn!(peer = %peer, error = %err, "capability poll failed");
            }
        }
    }

    /// Poll-request every known peer; used right after a (re)start to
    /// refresh the capability table without waiting a full interval.
    pub fn request_all_peer_polls(&self) {
        for peer in self.peers.get_peers() {
            if let Err(err) = self.request_poll(&peer) {
                tracing::warn!(peer = %peer, error = %err, "capability poll request failed");
            }
        }
    }

    /// Inbound dispatch. Poll messages refresh the sender's entry;
    /// poll-requests additionally get an immediate capability reply, even
    /// from peers the directory does not know yet. Other message types are
    /// not ours to judge.
    pub fn handle_message(&self, peer_id: &str, msg_type: &str, payload: &[u8]) -> Result<()> {
        if msg_type == messages::to_hex_string(MESSAGE_TYPE_POLL) {
            self.record_peer(peer_id, payload)
        } else if msg_type == messages::to_hex_string(MESSAGE_TYPE_REQUEST_POLL) {
            self.record_peer(peer_id, payload)?;
            self.poll(peer_id)
        } else {
            Ok(())
        }
    }

    fn send_capabilities(&self, peer_id: &str, message_type: u32) -> Result<()> {
        let msg = PollMessage {
            version: PROTOCOL_VERSION,
            assets: self.cfg.assets.clone(),
            peer_allowed: self.policy.is_peer_allowed(peer_id),
        };
        let payload = serde_json::to_vec(&msg).context("encode capability message")?;
        self.messenger
            .send_message(peer_id, &payload, message_type)
            .with_context(|| format!("send capability message to {peer_id}"))
    }

    fn record_peer(&self, peer_id: &str, payload: &[u8]) -> Result<()> {
        let msg: PollMessage =
            serde_json::from_slice(payload).context("decode capability message")?;
        self.store
            .update(
                peer_id,
                PollInfo {
                    protocol_version: msg.version,
                    assets: msg.assets,
                    peer_allowed: msg.peer_allowed,
                    last_seen: now_unix(),
                },
            )
            .with_context(|| format!("record capabilities of {peer_id}"))
    }
}
