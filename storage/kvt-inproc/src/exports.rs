//! The `extern "C"` entry points and the vtable that exposes them.
//!
//! Every export resolves its engine handle through a process-wide registry,
//! runs the operation under [`catch_unwind`], and reports failures as
//! status codes; panics never cross the boundary. Buffers handed to the
//! host are ordinary `Vec` allocations with their ownership suspended until
//! the host returns them through `free_buf` / `free_pairs`.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use kvt_boundary::raw::{
    KvtBatchOp, KvtBuf, KvtEngineVtable, KvtPairList, KvtSlice, BATCH_OP_DEL, BATCH_OP_SET,
};
use kvt_boundary::StatusCode;
use once_cell::sync::Lazy;

use crate::engine::Engine;

static ENGINES: Lazy<Mutex<HashMap<u64, Arc<Engine>>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_ENGINE: AtomicU64 = AtomicU64::new(1);

/// The boundary vtable for the in-process engine.
pub fn vtable() -> &'static KvtEngineVtable {
    static VTABLE: KvtEngineVtable = KvtEngineVtable {
        initialize: kvt_inproc_initialize,
        shutdown: kvt_inproc_shutdown,
        create_table: kvt_inproc_create_table,
        get_table_id: kvt_inproc_get_table_id,
        start_tx: kvt_inproc_start_tx,
        commit_tx: kvt_inproc_commit_tx,
        rollback_tx: kvt_inproc_rollback_tx,
        set: kvt_inproc_set,
        get: kvt_inproc_get,
        del: kvt_inproc_del,
        scan: kvt_inproc_scan,
        free_buf: kvt_inproc_free_buf,
        free_pairs: kvt_inproc_free_pairs,
        batch_execute: Some(kvt_inproc_batch_execute),
    };
    &VTABLE
}

fn engine(handle: u64) -> Result<Arc<Engine>, StatusCode> {
    ENGINES
        .lock()
        .expect("engine registry poisoned")
        .get(&handle)
        .cloned()
        .ok_or(StatusCode::Permanent)
}

/// Runs `f`, converting both status errors and panics into a raw code.
fn guarded(f: impl FnOnce() -> Result<(), StatusCode>) -> i32 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => StatusCode::Success.as_raw(),
        Ok(Err(code)) => code.as_raw(),
        Err(_) => {
            tracing::error!("panic caught at the engine boundary");
            StatusCode::Permanent.as_raw()
        }
    }
}

/// Suspends a `Vec`'s ownership and hands it out as a raw buffer.
fn buf_from_vec(vec: Vec<u8>) -> KvtBuf {
    let mut vec = std::mem::ManuallyDrop::new(vec);
    KvtBuf {
        ptr: vec.as_mut_ptr(),
        len: vec.len(),
        cap: vec.capacity(),
    }
}

/// Reclaims a buffer produced by [`buf_from_vec`].
unsafe fn vec_from_buf(buf: KvtBuf) -> Vec<u8> {
    if buf.is_null() {
        Vec::new()
    } else {
        Vec::from_raw_parts(buf.ptr, buf.len, buf.cap)
    }
}

fn pairs_from_vec(pairs: Vec<(Vec<u8>, Vec<u8>)>) -> KvtPairList {
    let mut bufs = Vec::with_capacity(pairs.len() * 2);
    for (key, value) in pairs {
        bufs.push(buf_from_vec(key));
        bufs.push(buf_from_vec(value));
    }
    let mut bufs = std::mem::ManuallyDrop::new(bufs);
    KvtPairList {
        bufs: bufs.as_mut_ptr(),
        len: bufs.len(),
        cap: bufs.capacity(),
    }
}

unsafe extern "C" fn kvt_inproc_initialize(out_handle: *mut u64) -> i32 {
    guarded(|| {
        let handle = NEXT_ENGINE.fetch_add(1, Ordering::Relaxed);
        ENGINES
            .lock()
            .expect("engine registry poisoned")
            .insert(handle, Arc::new(Engine::new()));
        tracing::debug!(handle, "in-process engine created");
        unsafe { *out_handle = handle };
        Ok(())
    })
}

unsafe extern "C" fn kvt_inproc_shutdown(handle: u64) -> i32 {
    guarded(|| {
        ENGINES
            .lock()
            .expect("engine registry poisoned")
            .remove(&handle)
            .map(|_| ())
            .ok_or(StatusCode::Permanent)
    })
}

unsafe extern "C" fn kvt_inproc_create_table(
    handle: u64,
    name: KvtSlice,
    partition: u8,
    out_table: *mut u64,
) -> i32 {
    guarded(|| {
        let id = engine(handle)?.create_table(unsafe { name.as_bytes() }, partition)?;
        unsafe { *out_table = id };
        Ok(())
    })
}

unsafe extern "C" fn kvt_inproc_get_table_id(
    handle: u64,
    name: KvtSlice,
    out_table: *mut u64,
) -> i32 {
    guarded(|| {
        let id = engine(handle)?.table_id(unsafe { name.as_bytes() })?;
        unsafe { *out_table = id };
        Ok(())
    })
}

unsafe extern "C" fn kvt_inproc_start_tx(handle: u64, out_tx: *mut u64) -> i32 {
    guarded(|| {
        let tx = engine(handle)?.start_tx();
        unsafe { *out_tx = tx };
        Ok(())
    })
}

unsafe extern "C" fn kvt_inproc_commit_tx(handle: u64, tx: u64) -> i32 {
    guarded(|| engine(handle)?.commit_tx(tx))
}

unsafe extern "C" fn kvt_inproc_rollback_tx(handle: u64, tx: u64) -> i32 {
    guarded(|| engine(handle)?.rollback_tx(tx))
}

unsafe extern "C" fn kvt_inproc_set(
    handle: u64,
    tx: u64,
    table: u64,
    key: KvtSlice,
    value: KvtSlice,
) -> i32 {
    guarded(|| {
        engine(handle)?.set(tx, table, unsafe { key.as_bytes() }, unsafe {
            value.as_bytes()
        })
    })
}

unsafe extern "C" fn kvt_inproc_get(
    handle: u64,
    tx: u64,
    table: u64,
    key: KvtSlice,
    out_value: *mut KvtBuf,
) -> i32 {
    guarded(|| {
        match engine(handle)?.get(tx, table, unsafe { key.as_bytes() })? {
            Some(value) => {
                unsafe { *out_value = buf_from_vec(value) };
                Ok(())
            }
            None => Err(StatusCode::NotFound),
        }
    })
}

unsafe extern "C" fn kvt_inproc_del(handle: u64, tx: u64, table: u64, key: KvtSlice) -> i32 {
    guarded(|| engine(handle)?.del(tx, table, unsafe { key.as_bytes() }))
}

unsafe extern "C" fn kvt_inproc_scan(
    handle: u64,
    tx: u64,
    table: u64,
    start: KvtSlice,
    end: KvtSlice,
    limit: i64,
    out: *mut KvtPairList,
) -> i32 {
    guarded(|| {
        let pairs = engine(handle)?.scan(
            tx,
            table,
            unsafe { start.as_bytes() },
            unsafe { end.as_bytes() },
            limit,
        )?;
        unsafe { *out = pairs_from_vec(pairs) };
        Ok(())
    })
}

unsafe extern "C" fn kvt_inproc_free_buf(buf: KvtBuf) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        drop(unsafe { vec_from_buf(buf) });
    }));
}

unsafe extern "C" fn kvt_inproc_free_pairs(pairs: KvtPairList) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        if pairs.bufs.is_null() {
            return;
        }
        let bufs = unsafe { Vec::from_raw_parts(pairs.bufs, pairs.len, pairs.cap) };
        for buf in bufs {
            drop(unsafe { vec_from_buf(buf) });
        }
    }));
}

unsafe extern "C" fn kvt_inproc_batch_execute(
    handle: u64,
    tx: u64,
    ops: *const KvtBatchOp,
    len: usize,
    out_results: *mut i32,
) -> i32 {
    guarded(|| {
        let engine = engine(handle)?;
        let ops = if ops.is_null() || len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(ops, len) }
        };
        // Every operation is attempted; the per-op slots tell the caller
        // which ones landed.
        let mut fully_applied = true;
        for (index, op) in ops.iter().enumerate() {
            let key = unsafe { op.key.as_bytes() };
            let applied = match op.kind {
                BATCH_OP_SET => engine.set(tx, op.table, key, unsafe { op.value.as_bytes() }),
                BATCH_OP_DEL => engine.del(tx, op.table, key),
                _ => Err(StatusCode::Permanent),
            };
            let code = match applied {
                Ok(()) => StatusCode::Success,
                Err(code) => {
                    fully_applied = false;
                    code
                }
            };
            if !out_results.is_null() {
                unsafe { *out_results.add(index) = code.as_raw() };
            }
        }
        if fully_applied {
            Ok(())
        } else {
            Err(StatusCode::BatchNotFullySuccess)
        }
    })
}
