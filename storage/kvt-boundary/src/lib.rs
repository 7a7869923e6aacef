#![deny(missing_docs)]

//! The foreign boundary between the host-side storage adapter and a native
//! KVT engine.
//!
//! Everything that crosses the seam is defined here: integer status codes,
//! `#[repr(C)]` buffer types, the engine vtable of `extern "C"` entry
//! points, and [`KvtRuntime`], the safe wrapper that owns marshalling.
//! Identifiers cross as plain `u64`s; byte buffers cross as pointer/length
//! pairs and are copied by each side into its own allocation before the
//! call returns. Engines must never unwind across the boundary; failures
//! are reported through status codes only.

mod error;
pub mod raw;
mod runtime;
mod status;

pub use error::BoundaryError;
pub use runtime::{BatchOp, KvtRuntime};
pub use status::{Partition, StatusCode};

/// A [`core::result::Result`] alias with [`BoundaryError`] as the error type.
pub type Result<T, E = BoundaryError> = core::result::Result<T, E>;

/// The reserved transaction identifier meaning "no explicit transaction".
///
/// Operations issued under `NO_TX` are applied by the engine with
/// single-operation auto-commit semantics.
pub const NO_TX: u64 = 0;
