//! The store manager: engine lifecycle, table registry, transactions and
//! multi-store mutation batches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use kvt_boundary::raw::KvtEngineVtable;
use kvt_boundary::{BatchOp, BoundaryError, KvtRuntime, NO_TX};
use serde::{Deserialize, Serialize};

use crate::buffer::StaticBuffer;
use crate::codec::{composite, EncodingMode};
use crate::error::BackendError;
use crate::features::StoreFeatures;
use crate::query::Entry;
use crate::store::KvtStore;
use crate::tx::KvtTransaction;
use crate::{Result, StorageError};

/// Static configuration of a manager. The encoding (and with it the
/// partitioning of every table) is fixed for the manager's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KvtConfig {
    /// The encoding bridging rows onto engine pairs.
    pub encoding: EncodingMode,
    /// Whether the engine behind the boundary persists data. Passed
    /// through to [`StoreFeatures`].
    pub backend_persists: bool,
    /// Whether the engine behind the boundary is distributed. Passed
    /// through to [`StoreFeatures`].
    pub backend_distributed: bool,
}

impl Default for KvtConfig {
    fn default() -> Self {
        KvtConfig {
            encoding: EncodingMode::CompositeKey,
            backend_persists: false,
            backend_distributed: false,
        }
    }
}

/// Additions and deletions for one row of one store.
#[derive(Debug, Clone, Default)]
pub struct RowMutation {
    /// Entries to add; these win over deletions naming the same column.
    pub additions: Vec<Entry>,
    /// Columns to delete.
    pub deletions: Vec<StaticBuffer>,
}

/// A multi-store mutation batch: store name → row key → row mutation.
pub type MutationBatch = HashMap<String, HashMap<StaticBuffer, RowMutation>>;

/// The put-if-absent table registry shared between a manager and its
/// stores. This is the only mutable state the adapter itself holds.
#[derive(Default)]
pub(crate) struct StoreRegistry {
    stores: Mutex<HashMap<String, Arc<KvtStore>>>,
}

impl StoreRegistry {
    fn get(&self, name: &str) -> Option<Arc<KvtStore>> {
        self.stores
            .lock()
            .expect("store registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Inserts `store` unless `name` is already registered; returns the
    /// winner either way.
    fn put_if_absent(&self, name: &str, store: Arc<KvtStore>) -> Arc<KvtStore> {
        self.stores
            .lock()
            .expect("store registry lock poisoned")
            .entry(name.to_string())
            .or_insert(store)
            .clone()
    }

    pub(crate) fn remove(&self, name: &str) {
        self.stores
            .lock()
            .expect("store registry lock poisoned")
            .remove(name);
    }

    fn snapshot(&self) -> Vec<Arc<KvtStore>> {
        self.stores
            .lock()
            .expect("store registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn drain(&self) -> Vec<Arc<KvtStore>> {
        self.stores
            .lock()
            .expect("store registry lock poisoned")
            .drain()
            .map(|(_, store)| store)
            .collect()
    }
}

/// The process-wide entry point to KVT-backed storage.
///
/// A manager owns one engine instance, hands out [`KvtStore`]s through
/// [`open_database`](KvtStoreManager::open_database), and starts the
/// [`KvtTransaction`]s operations run under. Managers are `Send + Sync`;
/// the registry uses put-if-absent so concurrent opens of one name resolve
/// to a single store.
pub struct KvtStoreManager {
    runtime: Arc<KvtRuntime>,
    registry: Arc<StoreRegistry>,
    config: KvtConfig,
    closed: AtomicBool,
}

impl std::fmt::Debug for KvtStoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvtStoreManager")
            .field("config", &self.config)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl KvtStoreManager {
    /// Initializes the engine behind `vtable` and wraps it in a manager.
    pub fn new(config: KvtConfig, vtable: &'static KvtEngineVtable) -> Result<Self> {
        let runtime = KvtRuntime::initialize(vtable).map_err(|e| {
            StorageError::Backend(BackendError::Initialization(e.to_string()))
        })?;
        tracing::info!(encoding = ?config.encoding, "kvt store manager initialized");
        Ok(KvtStoreManager {
            runtime: Arc::new(runtime),
            registry: Arc::new(StoreRegistry::default()),
            config,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::IllegalState(
                "store manager is closed".to_string(),
            ));
        }
        Ok(())
    }

    /// The features this manager's stores support, for the consumer to
    /// gate its plans on.
    pub fn features(&self) -> StoreFeatures {
        StoreFeatures::for_mode(
            self.config.encoding,
            self.config.backend_persists,
            self.config.backend_distributed,
        )
    }

    /// Opens the store named `name`, creating its table on first use.
    /// Idempotent: reopening a name returns the already-registered store,
    /// and the table keeps its engine-side identifier across reopens.
    pub fn open_database(&self, name: &str) -> Result<Arc<KvtStore>> {
        self.ensure_open()?;
        if let Some(store) = self.registry.get(name) {
            return Ok(store);
        }
        let partition = self.config.encoding.partition();
        let table = match self.runtime.create_table(name.as_bytes(), partition) {
            Ok(table) => {
                tracing::debug!(store = name, table, "table created");
                table
            }
            Err(BoundaryError::TableAlreadyExists) => self
                .runtime
                .table_id(name.as_bytes())
                .map_err(|e| StorageError::backend("get_table_id", e))?,
            Err(e) => return Err(StorageError::backend("create_table", e)),
        };
        let store = Arc::new(KvtStore::new(
            name.to_string(),
            table,
            self.config.encoding,
            Arc::clone(&self.runtime),
            Arc::downgrade(&self.registry),
        ));
        Ok(self.registry.put_if_absent(name, store))
    }

    /// Starts a transaction. Fails with
    /// [`BackendError::ResourceExhausted`] when the engine refuses.
    pub fn begin_transaction(&self) -> Result<KvtTransaction> {
        self.ensure_open()?;
        KvtTransaction::begin(Arc::clone(&self.runtime))
    }

    /// Applies a batch of mutations across several stores within the
    /// caller's transaction. Stores are opened as needed. Atomicity
    /// follows the transaction: everything commits or aborts together.
    ///
    /// Under the composite-key encoding the batch goes through the
    /// engine's native batch entry when one is available.
    pub fn mutate_many(&self, batch: &MutationBatch, tx: &KvtTransaction) -> Result<()> {
        self.ensure_open()?;
        if !tx.belongs_to(&self.runtime) {
            return Err(StorageError::IllegalArgument(
                "transaction belongs to a different store manager".to_string(),
            ));
        }
        let txid = tx.expect_open()?;
        // The native batch entry is only taken inside an explicit
        // transaction; auto-commit batches would not be atomic.
        if self.config.encoding == EncodingMode::CompositeKey
            && self.runtime.supports_batch()
            && txid != NO_TX
        {
            return self.mutate_many_batched(batch, txid);
        }
        for (store_name, rows) in batch {
            let store = self.open_database(store_name)?;
            for (key, mutation) in rows {
                store.mutate(tx, key, &mutation.additions, &mutation.deletions)?;
            }
        }
        Ok(())
    }

    fn mutate_many_batched(&self, batch: &MutationBatch, txid: u64) -> Result<()> {
        // Everything is encoded and validated before the first engine call.
        enum EncodedOp {
            Set { table: u64, key: Vec<u8>, value: Vec<u8> },
            Del { table: u64, key: Vec<u8> },
        }
        let mut encoded = Vec::new();
        for (store_name, rows) in batch {
            let store = self.open_database(store_name)?;
            let table = store.table_id();
            for (key, mutation) in rows {
                composite::validate_component(key, "row key")?;
                for column in &mutation.deletions {
                    composite::validate_component(column, "column")?;
                    encoded.push(EncodedOp::Del {
                        table,
                        key: composite::encode_entry_key(key, column),
                    });
                }
                for entry in &mutation.additions {
                    composite::validate_component(&entry.column, "column")?;
                    encoded.push(EncodedOp::Set {
                        table,
                        key: composite::encode_entry_key(key, &entry.column),
                        value: entry.value.to_vec(),
                    });
                }
            }
        }
        let ops: Vec<BatchOp<'_>> = encoded
            .iter()
            .map(|op| match op {
                EncodedOp::Set { table, key, value } => BatchOp::Set {
                    table: *table,
                    key,
                    value,
                },
                EncodedOp::Del { table, key } => BatchOp::Del { table: *table, key },
            })
            .collect();
        self.runtime
            .batch_execute(txid, &ops)
            .map_err(|e| StorageError::backend("batch_execute", e))
    }

    /// Removes every row of every registered store. The manager and its
    /// stores stay usable.
    pub fn clear_storage(&self) -> Result<()> {
        self.ensure_open()?;
        let txid = self
            .runtime
            .start_tx()
            .map_err(|_| StorageError::Backend(BackendError::ResourceExhausted))?;
        let outcome = self.clear_all_rows(txid);
        match outcome {
            Ok(()) => {
                self.runtime
                    .commit_tx(txid)
                    .map_err(|e| StorageError::backend("commit", e))?;
                tracing::info!("storage cleared");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = self.runtime.rollback_tx(txid) {
                    tracing::warn!(error = %rollback_err, "rollback after failed clear");
                }
                Err(e)
            }
        }
    }

    fn clear_all_rows(&self, txid: u64) -> Result<()> {
        for store in self.registry.snapshot() {
            let pairs = self
                .runtime
                .scan(txid, store.table_id(), &[], &[], 0)
                .map_err(|e| StorageError::backend("scan", e))?;
            for (key, _) in pairs {
                self.runtime
                    .del(txid, store.table_id(), &key)
                    .map_err(|e| StorageError::backend("del", e))?;
            }
        }
        Ok(())
    }

    /// Whether any registered store holds at least one row.
    pub fn exists(&self) -> Result<bool> {
        self.ensure_open()?;
        for store in self.registry.snapshot() {
            let pairs = self
                .runtime
                .scan(NO_TX, store.table_id(), &[], &[], 1)
                .map_err(|e| StorageError::backend("scan", e))?;
            if !pairs.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The key ranges owned by the local node. This adapter cannot tell,
    /// so it reports unsupported by returning `None`; consumers check
    /// [`features`](KvtStoreManager::features) before relying on it.
    pub fn local_key_partition(&self) -> Option<Vec<(StaticBuffer, StaticBuffer)>> {
        None
    }

    /// Closes every store, then shuts the engine down. Idempotent; any
    /// operation after the first close fails with `IllegalState`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for store in self.registry.drain() {
            store.mark_closed();
        }
        self.runtime
            .shutdown()
            .map_err(|e| StorageError::backend("shutdown", e))?;
        tracing::info!("kvt store manager closed");
        Ok(())
    }
}

impl Drop for KvtStoreManager {
    fn drop(&mut self) {
        // The runtime shuts the engine down on drop; stores just need to
        // stop accepting work.
        if !self.closed.swap(true, Ordering::AcqRel) {
            for store in self.registry.drain() {
                store.mark_closed();
            }
        }
    }
}
