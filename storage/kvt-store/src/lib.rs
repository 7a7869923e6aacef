#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Key-column-value storage over a transactional key-value engine.
//!
//! This crate projects the ordered *key → (column → value)* contract a
//! graph layer consumes onto the flat byte-key/byte-value KVT engine
//! reached through [`kvt_boundary`]. Rows are ordered maps over columns;
//! slices are half-open column ranges returned in ascending column order;
//! key-range scans yield distinct row keys ascending.
//!
//! Two encodings bridge the gap. The composite-key encoding packs
//! `row ∥ 0x00 ∥ column` into one engine key and supports ordered scans;
//! the packed-columns encoding serializes a whole row into one engine
//! value and trades ordered iteration for hash partitioning. The choice is
//! fixed per [`KvtStoreManager`] at construction.
//!
//! Entry points: build a [`KvtStoreManager`] from a [`KvtConfig`] and an
//! engine vtable, open stores with
//! [`open_database`](KvtStoreManager::open_database), and run operations
//! under [`KvtTransaction`]s.

pub mod buffer;
pub mod codec;
mod error;
mod features;
mod manager;
mod metrics;
pub mod query;
mod store;
mod tx;

pub use buffer::StaticBuffer;
pub use codec::EncodingMode;
pub use error::{BackendError, StorageError};
pub use features::StoreFeatures;
pub use manager::{KvtConfig, KvtStoreManager, MutationBatch, RowMutation};
pub use query::{Entry, EntryList, KeyRangeQuery, KeySliceQuery, MultiSlicesQuery, SliceQuery};
pub use store::{KeyEntries, KeyIterator, KvtStore};
pub use tx::KvtTransaction;

/// A [`core::result::Result`] alias with [`StorageError`] as the error type.
pub type Result<T, E = StorageError> = core::result::Result<T, E>;
