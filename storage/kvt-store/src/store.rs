//! Per-table key-column-value operations.

use std::collections::HashMap;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use kvt_boundary::{KvtRuntime, NO_TX};

use crate::buffer::StaticBuffer;
use crate::codec::{composite, packed, EncodingMode};
use crate::manager::StoreRegistry;
use crate::metrics::{
    KVT_DELETES, KVT_MUTATE_BYTES, KVT_MUTATE_LATENCY_SECONDS, KVT_SCAN_LATENCY_SECONDS,
    KVT_SLICE_BYTES, KVT_SLICE_LATENCY_SECONDS,
};
use crate::query::{Entry, EntryList, KeyRangeQuery, KeySliceQuery, MultiSlicesQuery, SliceQuery};
use crate::tx::KvtTransaction;
use crate::{Result, StorageError};

/// One named table, exposed as an ordered key-column-value map.
///
/// All operations take the caller's [`KvtTransaction`]; pass the
/// [`autocommit`](KvtTransaction::autocommit) handle for single-operation
/// auto-commit semantics. Stores are cheap to share and safe for
/// concurrent use; each thread is expected to bring its own transaction.
pub struct KvtStore {
    name: String,
    table: u64,
    mode: EncodingMode,
    runtime: Arc<KvtRuntime>,
    registry: Weak<StoreRegistry>,
    closed: AtomicBool,
}

impl std::fmt::Debug for KvtStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvtStore")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("mode", &self.mode)
            .finish()
    }
}

impl KvtStore {
    pub(crate) fn new(
        name: String,
        table: u64,
        mode: EncodingMode,
        runtime: Arc<KvtRuntime>,
        registry: Weak<StoreRegistry>,
    ) -> Self {
        KvtStore {
            name,
            table,
            mode,
            runtime,
            registry,
            closed: AtomicBool::new(false),
        }
    }

    /// The table name this store was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stable engine-side table identifier.
    pub fn table_id(&self) -> u64 {
        self.table
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::IllegalState(format!(
                "store '{}' is closed",
                self.name
            )));
        }
        Ok(())
    }

    /// Resolves the boundary transaction id, rejecting finished handles and
    /// handles issued by a different manager.
    fn tx_id(&self, tx: &KvtTransaction) -> Result<u64> {
        if !tx.belongs_to(&self.runtime) {
            return Err(StorageError::IllegalArgument(
                "transaction belongs to a different store manager".to_string(),
            ));
        }
        tx.expect_open()
    }

    /// Returns the entries of row `key` with columns in `[start, end)`,
    /// ascending by column, truncated to the query's limit.
    ///
    /// An absent row is an empty list, never an error.
    pub fn get_slice(
        &self,
        tx: &KvtTransaction,
        key: &StaticBuffer,
        query: &SliceQuery,
    ) -> Result<EntryList> {
        self.ensure_open()?;
        let txid = self.tx_id(tx)?;
        let _timer = KVT_SLICE_LATENCY_SECONDS
            .with_label_values(&[&self.name])
            .start_timer();

        let entries = match self.mode {
            EncodingMode::CompositeKey => self.slice_composite(txid, key, query)?,
            EncodingMode::PackedColumns => self.slice_packed(txid, key, query)?,
        };

        let bytes: usize = entries
            .iter()
            .map(|e| e.column.len() + e.value.len())
            .sum();
        KVT_SLICE_BYTES
            .with_label_values(&[&self.name])
            .observe(bytes as f64);
        Ok(entries)
    }

    fn slice_composite(
        &self,
        txid: u64,
        key: &StaticBuffer,
        query: &SliceQuery,
    ) -> Result<EntryList> {
        let (start, end) = composite::row_scan_range(key, query)?;
        if !query.is_satisfiable() {
            return Ok(Vec::new());
        }
        let limit = query.limit().map(|l| l as i64).unwrap_or(0);
        let pairs = self
            .runtime
            .scan(txid, self.table, &start, &end, limit)
            .map_err(|e| StorageError::backend("scan", e))?;
        let mut entries = Vec::with_capacity(pairs.len());
        for (raw_key, value) in pairs {
            let (_, column) = composite::decode_entry_key(&raw_key)?;
            entries.push(Entry {
                column,
                value: StaticBuffer::from(value),
            });
        }
        Ok(entries)
    }

    fn slice_packed(
        &self,
        txid: u64,
        key: &StaticBuffer,
        query: &SliceQuery,
    ) -> Result<EntryList> {
        if !query.is_satisfiable() {
            return Ok(Vec::new());
        }
        let stored = self
            .runtime
            .get(txid, self.table, key.as_slice())
            .map_err(|e| StorageError::backend("get", e))?;
        let Some(stored) = stored else {
            return Ok(Vec::new());
        };
        let row = packed::deserialize(&stored)?;
        let cap = query.limit().unwrap_or(usize::MAX);
        Ok(row
            .into_iter()
            .filter(|entry| query.contains(&entry.column))
            .take(cap)
            .collect())
    }

    /// Evaluates a slice already bound to its row key.
    pub fn get_key_slice(&self, tx: &KvtTransaction, query: &KeySliceQuery) -> Result<EntryList> {
        self.get_slice(tx, &query.key, &query.slice)
    }

    /// Runs the same slice for every key in `keys`. The result holds an
    /// entry for every requested key; absent rows map to empty lists.
    pub fn get_slice_multi(
        &self,
        tx: &KvtTransaction,
        keys: &[StaticBuffer],
        query: &SliceQuery,
    ) -> Result<HashMap<StaticBuffer, EntryList>> {
        let mut results = HashMap::with_capacity(keys.len());
        for key in keys {
            results.insert(key.clone(), self.get_slice(tx, key, query)?);
        }
        Ok(results)
    }

    /// Evaluates several slices for the same set of rows, one result map
    /// per slice, in query order.
    pub fn get_multi_slices(
        &self,
        tx: &KvtTransaction,
        query: &MultiSlicesQuery,
    ) -> Result<Vec<HashMap<StaticBuffer, EntryList>>> {
        query
            .queries
            .iter()
            .map(|slice| self.get_slice_multi(tx, &query.keys, slice))
            .collect()
    }

    /// Applies `deletions` then `additions` to row `key`, atomically within
    /// the caller's transaction. A column named on both sides ends up with
    /// the added value. With both lists empty the call is a no-op.
    pub fn mutate(
        &self,
        tx: &KvtTransaction,
        key: &StaticBuffer,
        additions: &[Entry],
        deletions: &[StaticBuffer],
    ) -> Result<()> {
        self.ensure_open()?;
        let txid = self.tx_id(tx)?;
        if additions.is_empty() && deletions.is_empty() {
            return Ok(());
        }
        let _timer = KVT_MUTATE_LATENCY_SECONDS
            .with_label_values(&[&self.name])
            .start_timer();
        match self.mode {
            EncodingMode::CompositeKey => self.mutate_composite(txid, key, additions, deletions),
            EncodingMode::PackedColumns => self.mutate_packed(txid, key, additions, deletions),
        }
    }

    fn mutate_composite(
        &self,
        txid: u64,
        key: &StaticBuffer,
        additions: &[Entry],
        deletions: &[StaticBuffer],
    ) -> Result<()> {
        composite::validate_component(key, "row key")?;
        for column in deletions {
            composite::validate_component(column, "column")?;
        }
        for entry in additions {
            composite::validate_component(&entry.column, "column")?;
        }
        // Individual engine operations are only atomic inside an explicit
        // transaction; the engine's auto-commit covers one operation.
        if txid == NO_TX && additions.len() + deletions.len() > 1 {
            return Err(StorageError::IllegalArgument(
                "a multi-operation mutation requires an explicit transaction".to_string(),
            ));
        }
        for column in deletions {
            let raw = composite::encode_entry_key(key, column);
            self.runtime
                .del(txid, self.table, &raw)
                .map_err(|e| StorageError::backend("del", e))?;
        }
        KVT_DELETES
            .with_label_values(&[&self.name])
            .inc_by(deletions.len() as u64);
        let mut written = 0usize;
        for entry in additions {
            let raw = composite::encode_entry_key(key, &entry.column);
            written += raw.len() + entry.value.len();
            self.runtime
                .set(txid, self.table, &raw, entry.value.as_slice())
                .map_err(|e| StorageError::backend("set", e))?;
        }
        KVT_MUTATE_BYTES
            .with_label_values(&[&self.name])
            .observe(written as f64);
        Ok(())
    }

    fn mutate_packed(
        &self,
        txid: u64,
        key: &StaticBuffer,
        additions: &[Entry],
        deletions: &[StaticBuffer],
    ) -> Result<()> {
        // Read-modify-write on the whole row; the engine's per-key locking
        // keeps concurrent mutates of one row from losing updates.
        let existing = self
            .runtime
            .get(txid, self.table, key.as_slice())
            .map_err(|e| StorageError::backend("get", e))?
            .map(|stored| packed::deserialize(&stored))
            .transpose()?
            .unwrap_or_default();
        let merged = packed::merge(existing, additions, deletions);
        KVT_DELETES
            .with_label_values(&[&self.name])
            .inc_by(deletions.len() as u64);
        if merged.is_empty() {
            self.runtime
                .del(txid, self.table, key.as_slice())
                .map_err(|e| StorageError::backend("del", e))?;
        } else {
            let serialized = packed::serialize(&merged)?;
            KVT_MUTATE_BYTES
                .with_label_values(&[&self.name])
                .observe(serialized.len() as f64);
            self.runtime
                .set(txid, self.table, key.as_slice(), &serialized)
                .map_err(|e| StorageError::backend("set", e))?;
        }
        Ok(())
    }

    /// Yields each distinct row key in the query's key range holding at
    /// least one column in its slice, ascending, with that row's filtered
    /// entries. Requires the composite-key encoding.
    pub fn get_keys_ranged(
        &self,
        tx: &KvtTransaction,
        query: &KeyRangeQuery,
    ) -> Result<KeyIterator> {
        self.ensure_open()?;
        let txid = self.tx_id(tx)?;
        if self.mode != EncodingMode::CompositeKey {
            return Err(StorageError::IllegalArgument(
                "ordered key scans require the composite-key encoding".to_string(),
            ));
        }
        let _timer = KVT_SCAN_LATENCY_SECONDS
            .with_label_values(&[&self.name])
            .start_timer();
        let (start, end) = composite::key_range_bounds(query)?;
        let pairs = self
            .runtime
            .scan(txid, self.table, &start, &end, 0)
            .map_err(|e| StorageError::backend("scan", e))?;
        Self::group_composite(pairs, query.slice())
    }

    /// Yields every row of the table holding at least one column in
    /// `query`, with that row's filtered entries. No cross-row order is
    /// guaranteed in packed mode.
    pub fn get_keys_all(&self, tx: &KvtTransaction, query: &SliceQuery) -> Result<KeyIterator> {
        self.ensure_open()?;
        let txid = self.tx_id(tx)?;
        let _timer = KVT_SCAN_LATENCY_SECONDS
            .with_label_values(&[&self.name])
            .start_timer();
        match self.mode {
            EncodingMode::CompositeKey => {
                composite::validate_bound(query.column_start(), "column range start")?;
                composite::validate_bound(query.column_end(), "column range end")?;
                let pairs = self
                    .runtime
                    .scan(txid, self.table, &[], &[], 0)
                    .map_err(|e| StorageError::backend("scan", e))?;
                Self::group_composite(pairs, query)
            }
            EncodingMode::PackedColumns => {
                let pairs = self
                    .runtime
                    .scan(txid, self.table, &[], &[], 0)
                    .map_err(|e| StorageError::backend("scan", e))?;
                let cap = query.limit().unwrap_or(usize::MAX);
                let mut rows = Vec::new();
                for (raw_key, stored) in pairs {
                    let entries: EntryList = packed::deserialize(&stored)?
                        .into_iter()
                        .filter(|entry| query.contains(&entry.column))
                        .take(cap)
                        .collect();
                    if !entries.is_empty() {
                        rows.push(KeyEntries {
                            key: StaticBuffer::from(raw_key),
                            entries,
                        });
                    }
                }
                Ok(KeyIterator {
                    rows: rows.into_iter(),
                })
            }
        }
    }

    /// Groups an ordered composite scan into rows, keeping only columns the
    /// slice selects and capping entries per row at the slice limit.
    fn group_composite(pairs: Vec<(Vec<u8>, Vec<u8>)>, slice: &SliceQuery) -> Result<KeyIterator> {
        let cap = slice.limit().unwrap_or(usize::MAX);
        let mut rows: Vec<KeyEntries> = Vec::new();
        for (raw_key, value) in pairs {
            let (row_key, column) = composite::decode_entry_key(&raw_key)?;
            let selected = slice.contains(&column);
            match rows.last_mut() {
                Some(last) if last.key == row_key => {
                    if selected && last.entries.len() < cap {
                        last.entries.push(Entry {
                            column,
                            value: StaticBuffer::from(value),
                        });
                    }
                }
                _ => {
                    let mut entries = Vec::new();
                    if selected {
                        entries.push(Entry {
                            column,
                            value: StaticBuffer::from(value),
                        });
                    }
                    rows.push(KeyEntries {
                        key: row_key,
                        entries,
                    });
                }
            }
        }
        rows.retain(|row| !row.entries.is_empty());
        Ok(KeyIterator {
            rows: rows.into_iter(),
        })
    }

    /// Declares an intent to modify `(key, column)` based on `expected`.
    ///
    /// Locking is implicit in the engine's transactional reads and writes,
    /// so this validates the handle and otherwise does nothing.
    pub fn acquire_lock(
        &self,
        tx: &KvtTransaction,
        _key: &StaticBuffer,
        _column: &StaticBuffer,
        _expected: Option<&StaticBuffer>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.tx_id(tx)?;
        Ok(())
    }

    /// Closes the store and removes it from its manager's registry.
    /// Idempotent; the table and its data stay in the engine.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.name);
        }
        tracing::debug!(store = %self.name, "store closed");
        Ok(())
    }
}

/// One row yielded by a key scan: the row key plus its filtered entries,
/// materialized at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntries {
    key: StaticBuffer,
    entries: EntryList,
}

impl KeyEntries {
    /// The row key.
    pub fn key(&self) -> &StaticBuffer {
        &self.key
    }

    /// The row's entries within the query's column slice.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Consumes the row into its entry list.
    pub fn into_entries(self) -> EntryList {
        self.entries
    }
}

/// Iterator over the rows a key scan selected.
///
/// Results are materialized when the scan runs, so the iterator stays
/// valid regardless of what happens to the transaction afterwards. Rows
/// arrive in ascending key order for composite scans.
#[derive(Debug)]
pub struct KeyIterator {
    rows: std::vec::IntoIter<KeyEntries>,
}

impl Iterator for KeyIterator {
    type Item = KeyEntries;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for KeyIterator {}

impl FusedIterator for KeyIterator {}
