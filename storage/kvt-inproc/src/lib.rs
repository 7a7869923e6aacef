#![deny(missing_docs)]

//! In-process implementation of the KVT engine boundary.
//!
//! The engine lives behind real `extern "C"` entry points and is reached
//! exclusively through the [`KvtEngineVtable`](kvt_boundary::raw::KvtEngineVtable)
//! returned by [`vtable`], so hosts exercise the exact marshalling path a
//! native engine would. Tables are ordered in-memory maps; transactions
//! keep per-table write sets overlaid on committed state, which gives
//! read-your-writes inside a transaction and keeps uncommitted writes
//! invisible outside it. Commit applies the write set under the table
//! write lock; rollback discards it. Transaction id `0` applies operations
//! directly with single-operation auto-commit semantics.
//!
//! Nothing is persisted; the engine advertises neither durability nor
//! distribution.

mod engine;
mod exports;

pub use exports::vtable;
