//! Ordered, versioned schema migrations.
//!
//! Progress is tracked in a single `schema_migrations` row as `(version,
//! dirty)`. The dirty flag is raised before a step runs and cleared inside
//! the step's transaction, so a crash mid-step leaves `(target, dirty)`;
//! the next run forces back to the previous clean version and retries
//! forward from there.

use anyhow::{Context as _, Result};
use rusqlite::{Connection, OptionalExtension as _, params};

const MIGRATION_SWAPS: &str = r#"
CREATE TABLE swaps (
  swap_id BLOB PRIMARY KEY,
  type INTEGER NOT NULL,
  role INTEGER NOT NULL,
  previous_state TEXT NOT NULL,
  current_state TEXT NOT NULL,
  peer_node_id BLOB NOT NULL,
  initiator_node_id BLOB NOT NULL,
  created_at INTEGER NOT NULL,
  private_key BLOB NOT NULL,
  fee_preimage BLOB NOT NULL,
  opening_tx_fee INTEGER NOT NULL,
  opening_tx BLOB NOT NULL,
  starting_block_height INTEGER NOT NULL,
  claim_tx_id BLOB NOT NULL,
  claim_payment_hash BLOB NOT NULL,
  claim_preimage BLOB NOT NULL,
  next_message BLOB NOT NULL,
  next_message_type INTEGER NOT NULL,
  last_err TEXT NOT NULL
);
CREATE INDEX swaps_peer_idx ON swaps(peer_node_id);
"#;

const MIGRATION_REQUESTED_SWAPS: &str = r#"
CREATE TABLE requested_swaps (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  peer_node_id BLOB NOT NULL,
  asset TEXT NOT NULL,
  amount_sat INTEGER NOT NULL,
  type INTEGER NOT NULL,
  rejection_reason TEXT NOT NULL
);
CREATE INDEX requested_swaps_peer_idx ON requested_swaps(peer_node_id);
"#;

const MIGRATION_POLL_INFO: &str = r#"
CREATE TABLE poll_info (
  peer_node_id BLOB PRIMARY KEY,
  protocol_version INTEGER NOT NULL,
  peer_allowed INTEGER NOT NULL,
  last_seen INTEGER NOT NULL
);
CREATE TABLE poll_info_assets (
  peer_node_id BLOB NOT NULL,
  asset TEXT NOT NULL
);
CREATE INDEX poll_info_assets_peer_idx ON poll_info_assets(peer_node_id);
"#;

const MIGRATION_VERSION: &str = r#"
CREATE TABLE version (
  id INTEGER PRIMARY KEY CHECK (id = 0),
  version TEXT NOT NULL
);
"#;

// Confidential-asset support arrived after the initial schema.
const MIGRATION_BLINDING_KEY: &str = r#"
ALTER TABLE swaps ADD COLUMN blinding_key BLOB NOT NULL DEFAULT X'';
"#;

const MIGRATIONS: &[&str] = &[
    MIGRATION_SWAPS,
    MIGRATION_REQUESTED_SWAPS,
    MIGRATION_POLL_INFO,
    MIGRATION_VERSION,
    MIGRATION_BLINDING_KEY,
];

/// Brings the schema to the latest version; returns the version now in
/// effect.
pub fn migrate(conn: &mut Connection) -> Result<u32> {
    migrate_with(conn, MIGRATIONS)
}

fn migrate_with(conn: &mut Connection, migrations: &[&str]) -> Result<u32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER NOT NULL, dirty INTEGER NOT NULL)",
    )
    .context("create schema_migrations")?;

    let row: Option<(u32, bool)> = conn
        .query_row("SELECT version, dirty FROM schema_migrations", [], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })
        .optional()
        .context("read schema_migrations")?;

    let (mut version, dirty) = match row {
        Some(row) => row,
        None => {
            conn.execute("INSERT INTO schema_migrations (version, dirty) VALUES (0, 0)", [])
                .context("seed schema_migrations")?;
            (0, false)
        }
    };

    if dirty {
        let forced = version.saturating_sub(1);
        tracing::info!(
            from = version,
            to = forced,
            "dirty migration state detected, forcing back to last clean version"
        );
        conn.execute(
            "UPDATE schema_migrations SET version = ?1, dirty = 0",
            params![forced],
        )
        .context("force clean migration version")?;
        version = forced;
    }

    let start = version;
    for (idx, sql) in migrations.iter().enumerate() {
        let target = idx as u32 + 1;
        if target <= version {
            continue;
        }

        conn.execute(
            "UPDATE schema_migrations SET version = ?1, dirty = 1",
            params![target],
        )
        .with_context(|| format!("mark migration {target} in progress"))?;

        let tx = conn.transaction().context("begin migration transaction")?;
        tx.execute_batch(sql)
            .with_context(|| format!("apply migration {target}"))?;
        tx.execute(
            "UPDATE schema_migrations SET version = ?1, dirty = 0",
            params![target],
        )
        .with_context(|| format!("finish migration {target}"))?;
        tx.commit()
            .with_context(|| format!("commit migration {target}"))?;

        version = target;
    }

    if version == start {
        tracing::debug!(version, "no schema migrations required");
    } else {
        tracing::info!(from = start, to = version, "migrated sqlite schema");
    }

    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_in_memory() -> Connection {
        Connection::open_in_memory().expect("open in-memory sqlite")
    }

    fn stored_state(conn: &Connection) -> (u32, bool) {
        conn.query_row("SELECT version, dirty FROM schema_migrations", [], |r| {
            Ok((r.get(0).unwrap(), r.get(1).unwrap()))
        })
        .unwrap()
    }

    #[test]
    fn fresh_database_reaches_latest_version() {
        let mut conn = open_in_memory();
        let version = migrate(&mut conn).unwrap();
        assert_eq!(version, MIGRATIONS.len() as u32);
        assert_eq!(stored_state(&conn), (version, false));
    }

    #[test]
    fn rerun_is_a_no_op() {
        let mut conn = open_in_memory();
        let first = migrate(&mut conn).unwrap();
        let second = migrate(&mut conn).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn dirty_state_is_forced_back_and_retried() {
        let steps = [
            "CREATE TABLE a (x INTEGER);",
            "CREATE TABLE b (x INTEGER);",
        ];

        let mut conn = open_in_memory();
        migrate_with(&mut conn, &steps[..1]).unwrap();

        // Simulate a crash half-way through migration 2: the flag was
        // raised but the transaction never committed.
        conn.execute("UPDATE schema_migrations SET version = 2, dirty = 1", [])
            .unwrap();

        let version = migrate_with(&mut conn, &steps).unwrap();
        assert_eq!(version, 2);
        assert_eq!(stored_state(&conn), (2, false));
        // Migration 2 really ran this time.
        conn.execute("INSERT INTO b (x) VALUES (1)", []).unwrap();
    }

    #[test]
    fn blinding_key_column_defaults_to_empty() {
        let mut conn = open_in_memory();
        migrate(&mut conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('swaps') WHERE name = 'blinding_key'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
