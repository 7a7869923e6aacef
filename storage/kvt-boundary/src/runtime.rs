use std::sync::atomic::{AtomicBool, Ordering};

use crate::raw::{KvtBatchOp, KvtBuf, KvtEngineVtable, KvtPairList, KvtSlice, BATCH_OP_DEL, BATCH_OP_SET};
use crate::{BoundaryError, Partition, Result};

/// One operation of a host-side batch, borrowed for the duration of a
/// [`KvtRuntime::batch_execute`] call.
#[derive(Debug, Clone, Copy)]
pub enum BatchOp<'a> {
    /// Store `value` under `key` in `table`.
    Set {
        /// Target table.
        table: u64,
        /// Key bytes.
        key: &'a [u8],
        /// Value bytes.
        value: &'a [u8],
    },
    /// Remove `key` from `table`.
    Del {
        /// Target table.
        table: u64,
        /// Key bytes.
        key: &'a [u8],
    },
}

/// Safe wrapper around one initialized engine instance.
///
/// All byte buffers returned by the engine are copied into host-owned
/// allocations and released before the wrapping method returns; no raw
/// pointer escapes this type. The engine instance is torn down on
/// [`KvtRuntime::shutdown`] or, failing that, on drop.
pub struct KvtRuntime {
    vtable: &'static KvtEngineVtable,
    handle: u64,
    shut: AtomicBool,
}

impl std::fmt::Debug for KvtRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvtRuntime")
            .field("handle", &self.handle)
            .field("shut", &self.shut.load(Ordering::Acquire))
            .finish()
    }
}

impl KvtRuntime {
    /// Initializes an engine instance through `vtable`.
    pub fn initialize(vtable: &'static KvtEngineVtable) -> Result<Self> {
        let mut handle = 0u64;
        let status = unsafe { (vtable.initialize)(&mut handle) };
        BoundaryError::check(status)?;
        tracing::debug!(handle, "kvt engine initialized");
        Ok(KvtRuntime {
            vtable,
            handle,
            shut: AtomicBool::new(false),
        })
    }

    /// Shuts the engine instance down. Idempotent; the first call wins.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let status = unsafe { (self.vtable.shutdown)(self.handle) };
        BoundaryError::check(status)?;
        tracing::debug!(handle = self.handle, "kvt engine shut down");
        Ok(())
    }

    /// Creates `name` with the given partitioning, returning its id.
    /// Fails with [`BoundaryError::TableAlreadyExists`] when the name is
    /// taken; the caller resolves the id via [`KvtRuntime::table_id`].
    pub fn create_table(&self, name: &[u8], partition: Partition) -> Result<u64> {
        let mut table = 0u64;
        let status = unsafe {
            (self.vtable.create_table)(
                self.handle,
                KvtSlice::from_bytes(name),
                partition.as_raw(),
                &mut table,
            )
        };
        BoundaryError::check(status)?;
        Ok(table)
    }

    /// Resolves `name` to its stable table id.
    pub fn table_id(&self, name: &[u8]) -> Result<u64> {
        let mut table = 0u64;
        let status =
            unsafe { (self.vtable.get_table_id)(self.handle, KvtSlice::from_bytes(name), &mut table) };
        BoundaryError::check(status)?;
        Ok(table)
    }

    /// Starts a transaction and returns its identifier. Never returns the
    /// reserved value [`NO_TX`](crate::NO_TX).
    pub fn start_tx(&self) -> Result<u64> {
        let mut tx = 0u64;
        let status = unsafe { (self.vtable.start_tx)(self.handle, &mut tx) };
        BoundaryError::check(status)?;
        Ok(tx)
    }

    /// Commits `tx`.
    pub fn commit_tx(&self, tx: u64) -> Result<()> {
        let status = unsafe { (self.vtable.commit_tx)(self.handle, tx) };
        BoundaryError::check(status)
    }

    /// Rolls `tx` back.
    pub fn rollback_tx(&self, tx: u64) -> Result<()> {
        let status = unsafe { (self.vtable.rollback_tx)(self.handle, tx) };
        BoundaryError::check(status)
    }

    /// Stores `value` under `key`.
    pub fn set(&self, tx: u64, table: u64, key: &[u8], value: &[u8]) -> Result<()> {
        let status = unsafe {
            (self.vtable.set)(
                self.handle,
                tx,
                table,
                KvtSlice::from_bytes(key),
                KvtSlice::from_bytes(value),
            )
        };
        BoundaryError::check(status)
    }

    /// Point lookup. Returns `None` on a miss.
    pub fn get(&self, tx: u64, table: u64, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut out = KvtBuf::null();
        let status =
            unsafe { (self.vtable.get)(self.handle, tx, table, KvtSlice::from_bytes(key), &mut out) };
        match BoundaryError::check(status) {
            Ok(()) => Ok(Some(unsafe { self.take_buf(out) })),
            Err(BoundaryError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Removes `key`. Removing an absent key succeeds.
    pub fn del(&self, tx: u64, table: u64, key: &[u8]) -> Result<()> {
        let status =
            unsafe { (self.vtable.del)(self.handle, tx, table, KvtSlice::from_bytes(key)) };
        BoundaryError::check(status)
    }

    /// Ordered scan over `[start, end)`, ascending. An empty `end` means
    /// unbounded; `limit <= 0` means unlimited.
    pub fn scan(
        &self,
        tx: u64,
        table: u64,
        start: &[u8],
        end: &[u8],
        limit: i64,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = KvtPairList::null();
        let status = unsafe {
            (self.vtable.scan)(
                self.handle,
                tx,
                table,
                KvtSlice::from_bytes(start),
                KvtSlice::from_bytes(end),
                limit,
                &mut out,
            )
        };
        BoundaryError::check(status)?;
        Ok(unsafe { self.take_pairs(out) })
    }

    /// Whether the engine provides native batching.
    pub fn supports_batch(&self) -> bool {
        self.vtable.batch_execute.is_some()
    }

    /// Applies `ops` in order through the engine's `batch_execute` entry.
    /// Fails with [`BoundaryError::Permanent`] when the engine provides no
    /// batch entry; callers check [`KvtRuntime::supports_batch`] first.
    pub fn batch_execute(&self, tx: u64, ops: &[BatchOp<'_>]) -> Result<()> {
        let batch_fn = self
            .vtable
            .batch_execute
            .ok_or(BoundaryError::Permanent(-1))?;
        let raw_ops: Vec<KvtBatchOp> = ops
            .iter()
            .map(|op| match *op {
                BatchOp::Set { table, key, value } => KvtBatchOp {
                    kind: BATCH_OP_SET,
                    table,
                    key: KvtSlice::from_bytes(key),
                    value: KvtSlice::from_bytes(value),
                },
                BatchOp::Del { table, key } => KvtBatchOp {
                    kind: BATCH_OP_DEL,
                    table,
                    key: KvtSlice::from_bytes(key),
                    value: KvtSlice::from_bytes(&[]),
                },
            })
            .collect();
        let mut outcomes = vec![0i32; raw_ops.len()];
        let status = unsafe {
            batch_fn(
                self.handle,
                tx,
                raw_ops.as_ptr(),
                raw_ops.len(),
                outcomes.as_mut_ptr(),
            )
        };
        let checked = BoundaryError::check(status);
        if checked.is_err() {
            let failed = outcomes.iter().filter(|&&code| code != 0).count();
            tracing::debug!(total = raw_ops.len(), failed, "batch was not fully applied");
        }
        checked
    }

    /// Copies an engine buffer into a host allocation and frees it.
    ///
    /// # Safety
    ///
    /// `buf` must be a live allocation produced by this engine instance and
    /// not yet freed.
    unsafe fn take_buf(&self, buf: KvtBuf) -> Vec<u8> {
        let bytes = copy_buf(&buf);
        (self.vtable.free_buf)(buf);
        bytes
    }

    /// Copies a scan result into host pairs and frees the engine list.
    ///
    /// # Safety
    ///
    /// `pairs` must be a live list produced by this engine instance and not
    /// yet freed. `pairs.len` must be even.
    unsafe fn take_pairs(&self, pairs: KvtPairList) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut result = Vec::with_capacity(pairs.len / 2);
        if !pairs.bufs.is_null() {
            let bufs = std::slice::from_raw_parts(pairs.bufs, pairs.len);
            for chunk in bufs.chunks_exact(2) {
                result.push((copy_buf(&chunk[0]), copy_buf(&chunk[1])));
            }
        }
        (self.vtable.free_pairs)(pairs);
        result
    }
}

/// Copies an engine buffer's contents without taking ownership of it.
///
/// # Safety
///
/// `buf` must either be null or point at `buf.len` initialized bytes.
unsafe fn copy_buf(buf: &KvtBuf) -> Vec<u8> {
    if buf.is_null() {
        Vec::new()
    } else {
        std::slice::from_raw_parts(buf.ptr, buf.len).to_vec()
    }
}

impl Drop for KvtRuntime {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(handle = self.handle, error = %e, "engine shutdown on drop failed");
        }
    }
}
