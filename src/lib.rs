//! Durable state layer for a peer-to-peer atomic-swap engine running inside
//! a payment-channel node.
//!
//! The crate persists in-flight swap state machines behind two
//! interchangeable backends (a redb key-value store and a sqlite store),
//! keeps an append-only ledger of requested swaps, gates storage-format
//! upgrades on there being no unresolved swaps, and runs the capability
//! gossip that lets peers advertise protocol version and asset support.
//!
//! The swap state machine itself, the wire transport, and the host node's
//! RPC surface live outside this crate and reach it through the traits in
//! [`swap`], [`poll`] and [`version`].

pub mod kv;
pub mod logging;
pub mod messages;
pub mod poll;
pub mod sqlite;
pub mod store;
pub mod swap;
pub mod version;
