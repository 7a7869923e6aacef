//! Transaction handles and their lifecycle.

use std::sync::{Arc, Mutex};

use kvt_boundary::{BoundaryError, KvtRuntime, NO_TX};

use crate::error::BackendError;
use crate::{Result, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Open,
    Committed,
    RolledBack,
}

/// A handle to one engine transaction.
///
/// The handle transitions exactly once from `Open` to `Committed` or
/// `RolledBack`; any use after that fails with `IllegalState`. A handle
/// dropped while still open rolls its transaction back, so an engine
/// transaction can never leak past the handle owning it.
///
/// The [`autocommit`](KvtTransaction::autocommit) handle carries the
/// reserved id `0`: operations issued under it are applied by the engine
/// with single-operation auto-commit semantics, and it has no lifecycle of
/// its own.
#[derive(Debug)]
pub struct KvtTransaction {
    id: u64,
    state: Mutex<TxState>,
    runtime: Option<Arc<KvtRuntime>>,
}

impl KvtTransaction {
    /// Starts an engine transaction.
    pub(crate) fn begin(runtime: Arc<KvtRuntime>) -> Result<Self> {
        let id = runtime
            .start_tx()
            .map_err(|e| {
                tracing::debug!(error = %e, "engine refused a transaction");
                StorageError::Backend(BackendError::ResourceExhausted)
            })?;
        Ok(KvtTransaction {
            id,
            state: Mutex::new(TxState::Open),
            runtime: Some(runtime),
        })
    }

    /// The handle for operations that want auto-commit semantics.
    pub fn autocommit() -> Self {
        KvtTransaction {
            id: NO_TX,
            state: Mutex::new(TxState::Open),
            runtime: None,
        }
    }

    /// The engine-side transaction id; `0` for the autocommit handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this is the autocommit handle.
    pub fn is_autocommit(&self) -> bool {
        self.id == NO_TX
    }

    /// Whether operations may still run under this handle.
    pub fn is_open(&self) -> bool {
        *self.state.lock().expect("tx state lock poisoned") == TxState::Open
    }

    /// The id to pass across the boundary, or `IllegalState` when the
    /// handle has already finished.
    pub(crate) fn expect_open(&self) -> Result<u64> {
        if self.is_open() {
            Ok(self.id)
        } else {
            Err(StorageError::IllegalState(
                "transaction has already been committed or rolled back".to_string(),
            ))
        }
    }

    /// Whether the handle was issued by the manager owning `runtime`. The
    /// autocommit handle belongs to every manager.
    pub(crate) fn belongs_to(&self, runtime: &Arc<KvtRuntime>) -> bool {
        match &self.runtime {
            None => true,
            Some(own) => Arc::ptr_eq(own, runtime),
        }
    }

    /// Commits the transaction.
    ///
    /// A conflict surfaces as the retryable
    /// [`BackendError::Conflict`](crate::BackendError::Conflict) and leaves
    /// the handle open, so the caller can still roll back.
    pub fn commit(&self) -> Result<()> {
        let runtime = self.runtime.as_ref().ok_or_else(|| {
            StorageError::IllegalState("the autocommit handle cannot be committed".to_string())
        })?;
        let mut state = self.state.lock().expect("tx state lock poisoned");
        if *state != TxState::Open {
            return Err(StorageError::IllegalState(
                "transaction has already been committed or rolled back".to_string(),
            ));
        }
        match runtime.commit_tx(self.id) {
            Ok(()) => {
                *state = TxState::Committed;
                Ok(())
            }
            Err(BoundaryError::Conflict) => Err(StorageError::Backend(BackendError::Conflict)),
            Err(e) => Err(StorageError::backend("commit", e)),
        }
    }

    /// Rolls the transaction back.
    ///
    /// Engine-side rollback failures are logged and swallowed; once this
    /// returns the handle is finished either way.
    pub fn rollback(&self) -> Result<()> {
        let runtime = self.runtime.as_ref().ok_or_else(|| {
            StorageError::IllegalState("the autocommit handle cannot be rolled back".to_string())
        })?;
        let mut state = self.state.lock().expect("tx state lock poisoned");
        if *state != TxState::Open {
            return Err(StorageError::IllegalState(
                "transaction has already been committed or rolled back".to_string(),
            ));
        }
        if let Err(e) = runtime.rollback_tx(self.id) {
            tracing::warn!(tx = self.id, error = %e, "rollback failed in the engine");
        }
        *state = TxState::RolledBack;
        Ok(())
    }
}

impl Drop for KvtTransaction {
    fn drop(&mut self) {
        let Some(runtime) = &self.runtime else {
            return;
        };
        let state = self.state.get_mut().expect("tx state lock poisoned");
        if *state == TxState::Open {
            tracing::debug!(tx = self.id, "rolling back a dropped open transaction");
            if let Err(e) = runtime.rollback_tx(self.id) {
                tracing::warn!(tx = self.id, error = %e, "rollback on drop failed in the engine");
            }
            *state = TxState::RolledBack;
        }
    }
}
