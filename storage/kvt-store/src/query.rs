//! Query and result types of the key-column-value contract.

use crate::buffer::StaticBuffer;

/// One column/value pair of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The column, the inner key of the row.
    pub column: StaticBuffer,
    /// The value stored under the column. May be empty.
    pub value: StaticBuffer,
}

impl Entry {
    /// Builds an entry from anything buffer-convertible.
    pub fn new(column: impl Into<StaticBuffer>, value: impl Into<StaticBuffer>) -> Self {
        Entry {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Entries of one row, ascending by column, columns unique.
pub type EntryList = Vec<Entry>;

/// A half-open column range `[start, end)` with an optional positive limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceQuery {
    column_start: StaticBuffer,
    column_end: StaticBuffer,
    limit: Option<usize>,
}

impl SliceQuery {
    /// A slice over `[start, end)` without a limit.
    pub fn new(start: impl Into<StaticBuffer>, end: impl Into<StaticBuffer>) -> Self {
        SliceQuery {
            column_start: start.into(),
            column_end: end.into(),
            limit: None,
        }
    }

    /// Caps the result at `limit` entries, smallest columns first. Values
    /// of zero or below mean "no limit".
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = if limit > 0 { Some(limit as usize) } else { None };
        self
    }

    /// Inclusive start of the column range.
    pub fn column_start(&self) -> &StaticBuffer {
        &self.column_start
    }

    /// Exclusive end of the column range.
    pub fn column_end(&self) -> &StaticBuffer {
        &self.column_end
    }

    /// The entry cap, if one is set.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether the range can hold anything at all. `start >= end` denotes
    /// the empty range, never a wrapped one.
    pub fn is_satisfiable(&self) -> bool {
        self.column_start < self.column_end
    }

    /// Whether `column` falls inside `[start, end)`.
    pub fn contains(&self, column: &StaticBuffer) -> bool {
        *column >= self.column_start && *column < self.column_end
    }
}

/// A [`SliceQuery`] bound to one row key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySliceQuery {
    /// The row to read.
    pub key: StaticBuffer,
    /// The column range to return.
    pub slice: SliceQuery,
}

impl KeySliceQuery {
    /// Binds `slice` to `key`.
    pub fn new(key: impl Into<StaticBuffer>, slice: SliceQuery) -> Self {
        KeySliceQuery {
            key: key.into(),
            slice,
        }
    }
}

/// Several independent column slices evaluated for the same set of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSlicesQuery {
    /// The rows to read.
    pub keys: Vec<StaticBuffer>,
    /// The slices to evaluate per row.
    pub queries: Vec<SliceQuery>,
}

/// A half-open range over row keys combined with a column slice.
///
/// The limit of the contained slice applies per row; key enumeration
/// itself is unlimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRangeQuery {
    key_start: StaticBuffer,
    key_end: StaticBuffer,
    slice: SliceQuery,
}

impl KeyRangeQuery {
    /// A query over row keys in `[key_start, key_end)` returning columns
    /// per `slice`.
    pub fn new(
        key_start: impl Into<StaticBuffer>,
        key_end: impl Into<StaticBuffer>,
        slice: SliceQuery,
    ) -> Self {
        KeyRangeQuery {
            key_start: key_start.into(),
            key_end: key_end.into(),
            slice,
        }
    }

    /// Inclusive start of the key range.
    pub fn key_start(&self) -> &StaticBuffer {
        &self.key_start
    }

    /// Exclusive end of the key range. Empty means unbounded.
    pub fn key_end(&self) -> &StaticBuffer {
        &self.key_end
    }

    /// The per-row column slice.
    pub fn slice(&self) -> &SliceQuery {
        &self.slice
    }
}
