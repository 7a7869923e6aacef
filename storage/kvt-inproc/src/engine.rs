use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use kvt_boundary::{Partition, StatusCode, NO_TX};

/// One buffered write inside a transaction.
#[derive(Debug, Clone)]
enum WriteOp {
    Put(Vec<u8>),
    Delete,
}

/// Resolves one buffered entry to a scan pair; deletions yield nothing.
fn take_buffered(entry: Option<(&Vec<u8>, &WriteOp)>) -> Option<(Vec<u8>, Vec<u8>)> {
    match entry {
        Some((k, WriteOp::Put(v))) => Some((k.clone(), v.clone())),
        _ => None,
    }
}

/// A named table: committed rows behind a lock, ordered by raw key.
struct Table {
    rows: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Table {
    fn new() -> Self {
        Table {
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

struct TableRegistry {
    by_name: HashMap<Vec<u8>, u64>,
    by_id: HashMap<u64, Arc<Table>>,
}

/// Per-transaction write sets, keyed by table id. Reads overlay these on
/// the committed maps.
#[derive(Default)]
struct TxState {
    writes: HashMap<u64, BTreeMap<Vec<u8>, WriteOp>>,
}

/// One engine instance, addressed by the opaque handle handed across the
/// boundary.
pub(crate) struct Engine {
    tables: RwLock<TableRegistry>,
    txs: Mutex<HashMap<u64, TxState>>,
    next_table_id: AtomicU64,
    next_tx_id: AtomicU64,
}

impl Engine {
    pub(crate) fn new() -> Self {
        Engine {
            tables: RwLock::new(TableRegistry {
                by_name: HashMap::new(),
                by_id: HashMap::new(),
            }),
            txs: Mutex::new(HashMap::new()),
            next_table_id: AtomicU64::new(1),
            next_tx_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn create_table(&self, name: &[u8], partition: u8) -> Result<u64, StatusCode> {
        if Partition::from_raw(partition).is_none() {
            return Err(StatusCode::InvalidPartitionMethod);
        }
        let mut tables = self.tables.write().expect("table registry poisoned");
        if tables.by_name.contains_key(name) {
            return Err(StatusCode::TableAlreadyExists);
        }
        let id = self.next_table_id.fetch_add(1, Ordering::Relaxed);
        tables.by_name.insert(name.to_vec(), id);
        tables.by_id.insert(id, Arc::new(Table::new()));
        tracing::debug!(table = id, "table created");
        Ok(id)
    }

    pub(crate) fn table_id(&self, name: &[u8]) -> Result<u64, StatusCode> {
        let tables = self.tables.read().expect("table registry poisoned");
        tables
            .by_name
            .get(name)
            .copied()
            .ok_or(StatusCode::NotFound)
    }

    fn table(&self, id: u64) -> Result<Arc<Table>, StatusCode> {
        let tables = self.tables.read().expect("table registry poisoned");
        tables.by_id.get(&id).cloned().ok_or(StatusCode::Permanent)
    }

    pub(crate) fn start_tx(&self) -> u64 {
        let id = self.next_tx_id.fetch_add(1, Ordering::Relaxed);
        self.txs
            .lock()
            .expect("tx registry poisoned")
            .insert(id, TxState::default());
        id
    }

    pub(crate) fn commit_tx(&self, tx: u64) -> Result<(), StatusCode> {
        let state = self
            .txs
            .lock()
            .expect("tx registry poisoned")
            .remove(&tx)
            .ok_or(StatusCode::Permanent)?;
        for (table_id, writes) in state.writes {
            let table = self.table(table_id)?;
            let mut rows = table.rows.write().expect("table rows poisoned");
            for (key, op) in writes {
                match op {
                    WriteOp::Put(value) => {
                        rows.insert(key, value);
                    }
                    WriteOp::Delete => {
                        rows.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn rollback_tx(&self, tx: u64) -> Result<(), StatusCode> {
        self.txs
            .lock()
            .expect("tx registry poisoned")
            .remove(&tx)
            .map(|_| ())
            .ok_or(StatusCode::Permanent)
    }

    pub(crate) fn set(
        &self,
        tx: u64,
        table_id: u64,
        key: &[u8],
        value: &[u8],
    ) -> Result<(), StatusCode> {
        let table = self.table(table_id)?;
        if tx == NO_TX {
            table
                .rows
                .write()
                .expect("table rows poisoned")
                .insert(key.to_vec(), value.to_vec());
            return Ok(());
        }
        self.buffer_write(tx, table_id, key.to_vec(), WriteOp::Put(value.to_vec()))
    }

    pub(crate) fn del(&self, tx: u64, table_id: u64, key: &[u8]) -> Result<(), StatusCode> {
        let table = self.table(table_id)?;
        if tx == NO_TX {
            table
                .rows
                .write()
                .expect("table rows poisoned")
                .remove(key);
            return Ok(());
        }
        self.buffer_write(tx, table_id, key.to_vec(), WriteOp::Delete)
    }

    fn buffer_write(
        &self,
        tx: u64,
        table_id: u64,
        key: Vec<u8>,
        op: WriteOp,
    ) -> Result<(), StatusCode> {
        let mut txs = self.txs.lock().expect("tx registry poisoned");
        let state = txs.get_mut(&tx).ok_or(StatusCode::Permanent)?;
        state.writes.entry(table_id).or_default().insert(key, op);
        Ok(())
    }

    pub(crate) fn get(
        &self,
        tx: u64,
        table_id: u64,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, StatusCode> {
        let table = self.table(table_id)?;
        if tx != NO_TX {
            let txs = self.txs.lock().expect("tx registry poisoned");
            let state = txs.get(&tx).ok_or(StatusCode::Permanent)?;
            if let Some(op) = state.writes.get(&table_id).and_then(|w| w.get(key)) {
                return Ok(match op {
                    WriteOp::Put(value) => Some(value.clone()),
                    WriteOp::Delete => None,
                });
            }
        }
        let rows = table.rows.read().expect("table rows poisoned");
        Ok(rows.get(key).cloned())
    }

    /// Ordered scan over `[start, end)`; empty `end` means unbounded and
    /// `limit <= 0` means unlimited. The transaction's write set is merged
    /// over committed rows.
    pub(crate) fn scan(
        &self,
        tx: u64,
        table_id: u64,
        start: &[u8],
        end: &[u8],
        limit: i64,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StatusCode> {
        let table = self.table(table_id)?;
        if !end.is_empty() && start >= end {
            return Ok(Vec::new());
        }
        let range: (Bound<Vec<u8>>, Bound<Vec<u8>>) = (
            Bound::Included(start.to_vec()),
            if end.is_empty() {
                Bound::Unbounded
            } else {
                Bound::Excluded(end.to_vec())
            },
        );
        let cap = if limit > 0 { limit as usize } else { usize::MAX };

        let txs = self.txs.lock().expect("tx registry poisoned");
        let overlay = if tx == NO_TX {
            None
        } else {
            let state = txs.get(&tx).ok_or(StatusCode::Permanent)?;
            state.writes.get(&table_id)
        };
        let rows = table.rows.read().expect("table rows poisoned");

        let mut committed = rows.range(range.clone()).peekable();
        let mut buffered = overlay
            .map(|w| w.range(range))
            .into_iter()
            .flatten()
            .peekable();

        let mut result = Vec::new();
        while result.len() < cap {
            let next = match (committed.peek(), buffered.peek()) {
                (None, None) => break,
                (Some(_), None) => {
                    committed.next().map(|(k, v)| (k.clone(), v.clone()))
                }
                (None, Some(_)) => take_buffered(buffered.next()),
                (Some(&(ck, _)), Some(&(bk, _))) => {
                    if ck < bk {
                        committed.next().map(|(k, v)| (k.clone(), v.clone()))
                    } else {
                        // The buffered write shadows the committed row on a
                        // key match.
                        if ck == bk {
                            committed.next();
                        }
                        take_buffered(buffered.next())
                    }
                }
            };
            if let Some(pair) = next {
                result.push(pair);
            }
        }
        Ok(result)
    }
}
