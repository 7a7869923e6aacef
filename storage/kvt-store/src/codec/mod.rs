//! The two encodings bridging key-column-value rows and flat engine pairs.
//!
//! [`composite`] packs `(row, column)` into one engine key and leans on the
//! engine's key order for slices and key-range scans. [`packed`] serializes
//! a whole row into one engine value under the bare row key and filters
//! columns host-side. The manager fixes one mode at construction; the two
//! never mix within an engine instance.

pub mod composite;
pub mod packed;

use kvt_boundary::Partition;
use serde::{Deserialize, Serialize};

/// Which encoding a manager uses for all of its tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingMode {
    /// `row ∥ 0x00 ∥ column` composite engine keys; requires range
    /// partitioning and supports ordered key scans.
    CompositeKey,
    /// Whole-row values under bare row keys; hash partitioning, no ordered
    /// cross-row iteration.
    PackedColumns,
}

impl EncodingMode {
    /// The partitioning the encoding needs from the engine.
    pub fn partition(self) -> Partition {
        match self {
            EncodingMode::CompositeKey => Partition::Range,
            EncodingMode::PackedColumns => Partition::Hash,
        }
    }
}
