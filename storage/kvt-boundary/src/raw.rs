//! The raw `#[repr(C)]` surface shared with native engines.
//!
//! Ownership rules:
//!
//! - [`KvtSlice`] borrows host memory and is valid only for the duration of
//!   the call it is passed to. Engines copy what they need to keep.
//! - [`KvtBuf`] and [`KvtPairList`] are allocated by the engine and handed
//!   to the host through out-parameters. The host copies their contents and
//!   returns them through `free_buf` / `free_pairs`. No engine allocation
//!   outlives the runtime call that produced it.

/// A borrowed, call-scoped view of host bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KvtSlice {
    /// Start of the byte range. May be null when `len` is zero.
    pub ptr: *const u8,
    /// Length in bytes.
    pub len: usize,
}

impl KvtSlice {
    /// Borrows `bytes` for the duration of one call.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        KvtSlice {
            ptr: if bytes.is_empty() {
                std::ptr::null()
            } else {
                bytes.as_ptr()
            },
            len: bytes.len(),
        }
    }

    /// Reconstructs the byte view.
    ///
    /// # Safety
    ///
    /// `ptr` must point at `len` initialized bytes that stay alive for the
    /// duration of the borrow, or be null with `len == 0`.
    pub unsafe fn as_bytes<'a>(&self) -> &'a [u8] {
        if self.ptr.is_null() || self.len == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(self.ptr, self.len)
        }
    }
}

/// An engine-allocated byte buffer returned through an out-parameter.
#[repr(C)]
#[derive(Debug)]
pub struct KvtBuf {
    /// Start of the allocation. Null means "no value".
    pub ptr: *mut u8,
    /// Number of valid bytes.
    pub len: usize,
    /// Size of the allocation; engines need it back to free correctly.
    pub cap: usize,
}

impl KvtBuf {
    /// The empty buffer used to initialize out-parameters.
    pub fn null() -> Self {
        KvtBuf {
            ptr: std::ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }

    /// Whether the engine wrote a value into this buffer.
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

/// A scan result: a flat sequence of buffers alternating key, value, key,
/// value. `len` counts buffers, so it is always even.
#[repr(C)]
#[derive(Debug)]
pub struct KvtPairList {
    /// The buffer array, engine-allocated.
    pub bufs: *mut KvtBuf,
    /// Number of buffers (twice the number of pairs).
    pub len: usize,
    /// Size of the array allocation.
    pub cap: usize,
}

impl KvtPairList {
    /// The empty list used to initialize out-parameters.
    pub fn null() -> Self {
        KvtPairList {
            bufs: std::ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }
}

/// Operation kind discriminant for [`KvtBatchOp`].
pub const BATCH_OP_SET: u8 = 0;
/// Operation kind discriminant for [`KvtBatchOp`].
pub const BATCH_OP_DEL: u8 = 1;

/// One operation of a `batch_execute` call.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct KvtBatchOp {
    /// [`BATCH_OP_SET`] or [`BATCH_OP_DEL`].
    pub kind: u8,
    /// Target table.
    pub table: u64,
    /// Key bytes, borrowed for the call.
    pub key: KvtSlice,
    /// Value bytes for a set; ignored for a delete.
    pub value: KvtSlice,
}

/// The engine entry points. A native engine hands the host one static
/// instance of this table; every interaction goes through it.
///
/// All functions return a raw [`StatusCode`](crate::StatusCode) integer and
/// must not unwind.
#[repr(C)]
pub struct KvtEngineVtable {
    /// Brings an engine instance up. The returned handle identifies it in
    /// every subsequent call.
    pub initialize: unsafe extern "C" fn(out_handle: *mut u64) -> i32,
    /// Tears the engine instance down. The handle is invalid afterwards.
    pub shutdown: unsafe extern "C" fn(handle: u64) -> i32,
    /// Creates a table, failing with `TABLE_ALREADY_EXISTS` if the name is
    /// taken. `partition` is a raw [`Partition`](crate::Partition).
    pub create_table:
        unsafe extern "C" fn(handle: u64, name: KvtSlice, partition: u8, out_table: *mut u64) -> i32,
    /// Resolves a table name to its stable identifier.
    pub get_table_id:
        unsafe extern "C" fn(handle: u64, name: KvtSlice, out_table: *mut u64) -> i32,
    /// Starts a transaction.
    pub start_tx: unsafe extern "C" fn(handle: u64, out_tx: *mut u64) -> i32,
    /// Commits a transaction. `CONFLICT_OR_DEADLOCK` reports a retryable
    /// failure; the transaction is still live and may be rolled back.
    pub commit_tx: unsafe extern "C" fn(handle: u64, tx: u64) -> i32,
    /// Rolls a transaction back, discarding its writes.
    pub rollback_tx: unsafe extern "C" fn(handle: u64, tx: u64) -> i32,
    /// Stores `value` under `key`. `tx == 0` auto-commits.
    pub set: unsafe extern "C" fn(handle: u64, tx: u64, table: u64, key: KvtSlice, value: KvtSlice)
        -> i32,
    /// Point lookup. On `SUCCESS` the engine writes an owned buffer into
    /// `out_value`; on `NOT_FOUND` the out-parameter is left untouched.
    pub get: unsafe extern "C" fn(
        handle: u64,
        tx: u64,
        table: u64,
        key: KvtSlice,
        out_value: *mut KvtBuf,
    ) -> i32,
    /// Removes `key`. Deleting an absent key succeeds.
    pub del: unsafe extern "C" fn(handle: u64, tx: u64, table: u64, key: KvtSlice) -> i32,
    /// Ordered scan over `[start, end)`. An empty `end` means unbounded;
    /// `limit <= 0` means unlimited. Results are ascending by key.
    pub scan: unsafe extern "C" fn(
        handle: u64,
        tx: u64,
        table: u64,
        start: KvtSlice,
        end: KvtSlice,
        limit: i64,
        out: *mut KvtPairList,
    ) -> i32,
    /// Returns an engine allocation handed out through [`KvtBuf`].
    pub free_buf: unsafe extern "C" fn(buf: KvtBuf),
    /// Returns a scan result, including every contained buffer.
    pub free_pairs: unsafe extern "C" fn(pairs: KvtPairList),
    /// Applies a sequence of set/del operations through one call, in order.
    /// `out_results` points at `len` status slots, one per operation; when
    /// any operation fails the call returns `BATCH_NOT_FULLY_SUCCESS` and
    /// the slots tell the host which operations landed. Optional; engines
    /// without native batching leave this null and the host falls back to
    /// individual operations.
    pub batch_execute: Option<
        unsafe extern "C" fn(
            handle: u64,
            tx: u64,
            ops: *const KvtBatchOp,
            len: usize,
            out_results: *mut i32,
        ) -> i32,
    >,
}
