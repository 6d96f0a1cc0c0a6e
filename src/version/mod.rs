//! Version gate: refuses to move the stored format forward while swaps are
//! unresolved, so an upgrade can never strand in-flight financial state.

use crate::store::StoreError;
use crate::swap::SwapStore;

/// Storage-format version written by this build. Injected into
/// [`VersionService`] at construction rather than read as a global, so
/// tests can substitute their own.
pub const CURRENT_VERSION: &str = "v2";

/// Single persisted version tag. `get_version` fails with
/// [`StoreError::DoesNotExist`] when never set; `set_version` overwrites
/// unconditionally.
pub trait VersionStore {
    fn get_version(&self) -> Result<String, StoreError>;
    fn set_version(&self, version: &str) -> Result<(), StoreError>;
}

/// Answered by the swap engine, which scans its store for non-terminal
/// states. [`StoreActiveSwapChecker`] adapts any [`SwapStore`] directly.
pub trait ActiveSwapChecker {
    fn has_active_swaps(&self) -> anyhow::Result<bool>;
}

/// Adapter answering the active-swap question straight from a swap store.
pub struct StoreActiveSwapChecker<S>(pub S);

impl<S: SwapStore> ActiveSwapChecker for StoreActiveSwapChecker<S> {
    fn has_active_swaps(&self) -> anyhow::Result<bool> {
        Ok(self.0.has_active_swaps()?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// Startup must halt; the operator has to roll back to the named
    /// version and resolve the open swaps before upgrading again.
    #[error(
        "can't upgrade because of active swaps. Downgrade to version '{}' and resolve them first",
        stored_version.as_deref().unwrap_or("unknown")
    )]
    ActiveSwaps { stored_version: Option<String> },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("check active swaps: {0:#}")]
    Checker(#[source] anyhow::Error),
}

pub struct VersionService<S> {
    store: S,
    current: String,
}

impl<S: VersionStore> VersionService<S> {
    pub fn new(store: S, current_version: impl Into<String>) -> Self {
        Self {
            store,
            current: current_version.into(),
        }
    }

    /// Moves the stored version tag to the running version, but only when
    /// no swap is in flight.
    ///
    /// Same stored version: no-op, the checker is not consulted. Different
    /// (or absent) stored version with active swaps: fails without writing,
    /// so the gate is re-evaluated on every start until the swaps resolve.
    /// Otherwise the running version is written.
    pub fn safe_upgrade(&self, checker: &impl ActiveSwapChecker) -> Result<(), UpgradeError> {
        let stored = match self.store.get_version() {
            Ok(v) => Some(v),
            Err(StoreError::DoesNotExist) => None,
            Err(e) => return Err(e.into()),
        };

        if stored.as_deref() == Some(self.current.as_str()) {
            return Ok(());
        }

        let active = checker
            .has_active_swaps()
            .map_err(UpgradeError::Checker)?;
        if active {
            return Err(UpgradeError::ActiveSwaps {
                stored_version: stored,
            });
        }

        self.store.set_version(&self.current)?;
        Ok(())
    }
}
