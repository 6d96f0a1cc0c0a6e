use anyhow::{Context as _, Result};

use ln_swap_state::kv::KvSwapStore;
use ln_swap_state::sqlite::SqliteSwapStore;
use ln_swap_state::store::StoreError;
use ln_swap_state::swap::{
    STATE_CANCELED, STATE_CLAIMED_PREIMAGE, SwapData, SwapId, SwapRole, SwapStateMachine,
    SwapStore, SwapType,
};

const PEER_A: &str = "02aabbccdd";
const PEER_B: &str = "03eeff0011";

fn sample_swap(seed: u8, peer: &str, current: &str) -> SwapStateMachine {
    SwapStateMachine {
        swap_id: SwapId::from_bytes([seed; 32]),
        swap_type: SwapType::SwapOut,
        role: SwapRole::Maker,
        previous: "created".to_string(),
        current: current.to_string(),
        data: SwapData {
            peer_node_id: peer.to_string(),
            initiator_node_id: peer.to_string(),
            created_at: 1_700_000_000 + i64::from(seed),
            privkey_bytes: vec![seed; 32],
            fee_preimage: "aa11".to_string(),
            opening_tx_fee: 321,
            opening_tx_hex: "020000".to_string(),
            starting_block_height: 812_000,
            claim_tx_id: String::new(),
            claim_payment_hash: "cafe".to_string(),
            claim_preimage: String::new(),
            blinding_key_hex: "beef".to_string(),
            next_message: vec![1, 2, 3],
            next_message_type: 0xa465,
            last_err_string: String::new(),
        },
    }
}

fn run_suite(store: &impl SwapStore) -> Result<()> {
    // Round trip: every field survives.
    let a = sample_swap(1, PEER_A, "opening_tx_broadcasted");
    store.update_data(&a).context("create swap a")?;
    let got = store.get_data(&a.swap_id.to_string()).context("get swap a")?;
    assert_eq!(got, a);

    // Create-vs-update: second write wins, still one entry.
    let mut a2 = a.clone();
    a2.previous = a2.current.clone();
    a2.current = STATE_CLAIMED_PREIMAGE.to_string();
    a2.data.claim_tx_id = "dd55".to_string();
    a2.data.claim_preimage = "0102".to_string();
    store.update_data(&a2).context("update swap a")?;

    let got = store
        .get_data(&a.swap_id.to_string())
        .context("get swap a after update")?;
    assert_eq!(got, a2);
    assert_eq!(store.list_all().context("list after update")?.len(), 1);

    // Not-found is a typed error, not a zero record.
    let missing = SwapId::from_bytes([9; 32]).to_string();
    let err = store.get_data(&missing).unwrap_err();
    assert!(matches!(err, StoreError::DataNotAvailable), "got {err:?}");

    // Malformed ids fail with a decode error on read paths.
    let err = store.get_data("not-hex").unwrap_err();
    assert!(matches!(err, StoreError::Decode { .. }), "got {err:?}");
    let err = store.list_all_by_peer("zz").unwrap_err();
    assert!(matches!(err, StoreError::Decode { .. }), "got {err:?}");

    // Peer filter returns exactly the matching subset.
    let b = sample_swap(2, PEER_B, "created");
    let c = sample_swap(3, PEER_A, STATE_CANCELED);
    store.update_data(&b).context("create swap b")?;
    store.update_data(&c).context("create swap c")?;

    let all = store.list_all().context("list all")?;
    assert_eq!(all.len(), 3);

    let of_a = store.list_all_by_peer(PEER_A).context("list by peer a")?;
    assert_eq!(of_a.len(), 2);
    assert!(of_a.iter().all(|s| s.data.peer_node_id == PEER_A));

    let of_b = store.list_all_by_peer(PEER_B).context("list by peer b")?;
    assert_eq!(of_b.len(), 1);
    assert_eq!(of_b[0], b);

    // b is still in "created": active.
    assert!(store.has_active_swaps().context("active check")?);

    let mut b2 = b.clone();
    b2.current = STATE_CANCELED.to_string();
    store.update_data(&b2).context("cancel swap b")?;
    assert!(!store.has_active_swaps().context("active check drained")?);

    // Terminal swaps stay listed for history.
    assert_eq!(store.list_all().context("list after drain")?.len(), 3);

    Ok(())
}

#[test]
fn kv_swap_store_contract() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let db = ln_swap_state::kv::open_database(&dir.path().join("swaps"))?;
    let store = KvSwapStore::new(db).context("open kv swap store")?;
    run_suite(&store)
}

#[test]
fn sqlite_swap_store_contract() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let conn = ln_swap_state::sqlite::open_database(&dir.path().join("swaps.sqlite3"))?;
    let store = SqliteSwapStore::new(conn);
    run_suite(&store)
}

#[test]
fn sqlite_rejects_malformed_hex_fields_on_write() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let conn = ln_swap_state::sqlite::open_database(&dir.path().join("swaps.sqlite3"))?;
    let store = SqliteSwapStore::new(conn);

    let mut swap = sample_swap(4, PEER_A, "created");
    swap.data.fee_preimage = "odd".to_string();
    let err = store.update_data(&swap).unwrap_err();
    assert!(matches!(err, StoreError::Decode { .. }), "got {err:?}");

    // Nothing was written.
    let err = store.get_data(&swap.swap_id.to_string()).unwrap_err();
    assert!(matches!(err, StoreError::DataNotAvailable), "got {err:?}");
    Ok(())
}
