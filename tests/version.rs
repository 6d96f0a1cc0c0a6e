use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context as _, Result};

use ln_swap_state::kv::KvVersionStore;
use ln_swap_state::sqlite::SqliteVersionStore;
use ln_swap_state::store::StoreError;
use ln_swap_state::version::{ActiveSwapChecker, UpgradeError, VersionService, VersionStore};

fn run_store_suite(store: &impl VersionStore) -> Result<()> {
    // Never set: a typed absence, not an empty string.
    let err = store.get_version().unwrap_err();
    assert!(matches!(err, StoreError::DoesNotExist), "got {err:?}");

    store.set_version("v1").context("set v1")?;
    assert_eq!(store.get_version().context("get v1")?, "v1");

    // Overwrite, no append semantics.
    store.set_version("v2").context("set v2")?;
    assert_eq!(store.get_version().context("get v2")?, "v2");

    Ok(())
}

#[test]
fn kv_version_store_contract() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let db = ln_swap_state::kv::open_database(&dir.path().join("swaps"))?;
    let store = KvVersionStore::new(db).context("open kv version store")?;
    run_store_suite(&store)
}

#[test]
fn sqlite_version_store_contract() -> Result<()> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let conn = ln_swap_state::sqlite::open_database(&dir.path().join("swaps.sqlite3"))?;
    let store = SqliteVersionStore::new(conn);
    run_store_suite(&store)
}

#[derive(Default)]
struct MemoryVersionStore {
    version: Mutex<Option<String>>,
}

impl MemoryVersionStore {
    fn with(version: &str) -> Self {
        Self {
            version: Mutex::new(Some(version.to_string())),
        }
    }

    fn stored(&self) -> Option<String> {
        self.version.lock().expect("mutex poisoned").clone()
    }
}

impl VersionStore for &MemoryVersionStore {
    fn get_version(&self) -> Result<String, StoreError> {
        self.version
            .lock()
            .expect("mutex poisoned")
            .clone()
            .ok_or(StoreError::DoesNotExist)
    }

    fn set_version(&self, version: &str) -> Result<(), StoreError> {
        *self.version.lock().expect("mutex poisoned") = Some(version.to_string());
        Ok(())
    }
}

struct RecordingChecker {
    active: bool,
    calls: AtomicUsize,
}

impl RecordingChecker {
    fn new(active: bool) -> Self {
        Self {
            active,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ActiveSwapChecker for RecordingChecker {
    fn has_active_swaps(&self) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.active)
    }
}

#[test]
fn same_version_skips_the_checker() -> Result<()> {
    let store = MemoryVersionStore::with("v2");
    let checker = RecordingChecker::new(true);

    VersionService::new(&store, "v2")
        .safe_upgrade(&checker)
        .context("upgrade to same version")?;

    assert_eq!(checker.calls(), 0);
    assert_eq!(store.stored().as_deref(), Some("v2"));
    Ok(())
}

#[test]
fn active_swaps_block_the_upgrade_without_writing() {
    let store = MemoryVersionStore::with("v1");
    let checker = RecordingChecker::new(true);

    let err = VersionService::new(&store, "v2")
        .safe_upgrade(&checker)
        .unwrap_err();

    match err {
        UpgradeError::ActiveSwaps { ref stored_version } => {
            assert_eq!(stored_version.as_deref(), Some("v1"));
        }
        other => panic!("expected ActiveSwaps, got {other:?}"),
    }
    // The operator message names the version to downgrade to.
    assert!(err.to_string().contains("'v1'"), "got: {err}");
    // The gate did not advance; the next start re-evaluates.
    assert_eq!(store.stored().as_deref(), Some("v1"));
}

#[test]
fn missing_version_with_active_swaps_reports_unknown() {
    let store = MemoryVersionStore::default();
    let checker = RecordingChecker::new(true);

    let err = VersionService::new(&store, "v2")
        .safe_upgrade(&checker)
        .unwrap_err();

    match err {
        UpgradeError::ActiveSwaps { ref stored_version } => assert!(stored_version.is_none()),
        other => panic!("expected ActiveSwaps, got {other:?}"),
    }
    assert!(err.to_string().contains("unknown"), "got: {err}");
    assert_eq!(store.stored(), None);
}

#[test]
fn drained_store_advances_the_version() -> Result<()> {
    let store = MemoryVersionStore::with("v1");
    let checker = RecordingChecker::new(false);

    VersionService::new(&store, "v2")
        .safe_upgrade(&checker)
        .context("upgrade drained store")?;

    assert_eq!(checker.calls(), 1);
    assert_eq!(store.stored().as_deref(), Some("v2"));
    Ok(())
}

#[test]
fn first_start_writes_the_version() -> Result<()> {
    let store = MemoryVersionStore::default();
    let checker = RecordingChecker::new(false);

    VersionService::new(&store, "v2")
        .safe_upgrade(&checker)
        .context("first start")?;

    assert_eq!(store.stored().as_deref(), Some("v2"));
    Ok(())
}

#[test]
fn swap_store_adapter_answers_the_checker() -> Result<()> {
    use ln_swap_state::kv::KvSwapStore;
    use ln_swap_state::version::StoreActiveSwapChecker;

    let dir = tempfile::tempdir().context("create tempdir")?;
    let db = ln_swap_state::kv::open_database(&dir.path().join("swaps"))?;
    let swaps = KvSwapStore::new(db).context("open kv swap store")?;

    let checker = StoreActiveSwapChecker(swaps);
    assert!(!checker.has_active_swaps().context("empty store")?);
    Ok(())
}
