//! The composite-key encoding: `row ∥ SEPARATOR ∥ column`.
//!
//! The separator is `0x00`. It is the one byte value that keeps encoded
//! order identical to `(row, column)` order: no legal key byte sorts below
//! it, so a row's entries can never interleave with the entries of a row
//! it is a prefix of. The price is that row keys, columns, and slice
//! bounds must not contain `0x00`; the encoder rejects such inputs before
//! anything reaches the engine. Stored row keys and columns must also be
//! non-empty, otherwise the decoder could not tell them apart from the
//! separator itself. Bounds may be empty.

use crate::buffer::StaticBuffer;
use crate::query::{KeyRangeQuery, SliceQuery};
use crate::{Result, StorageError};

/// The byte separating row key from column inside an engine key.
pub const SEPARATOR: u8 = 0x00;

/// Validates a stored row key or column: non-empty, separator-free.
pub fn validate_component(buf: &StaticBuffer, what: &str) -> Result<()> {
    if buf.is_empty() {
        return Err(StorageError::IllegalArgument(format!(
            "{what} must not be empty under the composite-key encoding"
        )));
    }
    validate_bound(buf, what)
}

/// Validates a range bound: separator-free, possibly empty.
pub fn validate_bound(buf: &StaticBuffer, what: &str) -> Result<()> {
    if buf.as_slice().contains(&SEPARATOR) {
        return Err(StorageError::IllegalArgument(format!(
            "{what} must not contain the separator byte 0x00"
        )));
    }
    Ok(())
}

/// Encodes `(row, column)` into one engine key. Inputs must have been
/// validated.
pub fn encode_entry_key(row: &StaticBuffer, column: &StaticBuffer) -> Vec<u8> {
    let mut key = Vec::with_capacity(row.len() + 1 + column.len());
    key.extend_from_slice(row.as_slice());
    key.push(SEPARATOR);
    key.extend_from_slice(column.as_slice());
    key
}

/// Splits an engine key at the first separator.
pub fn decode_entry_key(raw: &[u8]) -> Result<(StaticBuffer, StaticBuffer)> {
    let at = raw.iter().position(|b| *b == SEPARATOR).ok_or_else(|| {
        StorageError::IllegalArgument(
            "engine key is missing the composite separator".to_string(),
        )
    })?;
    Ok((
        StaticBuffer::from_slice(&raw[..at]),
        StaticBuffer::from_slice(&raw[at + 1..]),
    ))
}

/// The engine scan range covering row `key`'s columns in
/// `[slice.start, slice.end)`. Every encoded column of the row shares the
/// `key ∥ 0x00` prefix, so the scan yields exactly the requested slice.
pub fn row_scan_range(key: &StaticBuffer, slice: &SliceQuery) -> Result<(Vec<u8>, Vec<u8>)> {
    validate_component(key, "row key")?;
    validate_bound(slice.column_start(), "column range start")?;
    validate_bound(slice.column_end(), "column range end")?;
    Ok((
        encode_entry_key(key, slice.column_start()),
        encode_entry_key(key, slice.column_end()),
    ))
}

/// The raw engine scan range for a key-range query. Row keys are
/// separator-free, so the raw bounds `[key_start, key_end)` cover exactly
/// the encoded entries of rows in that range: for any row `k < key_end`,
/// every `k ∥ 0x00 ∥ c` still sorts below `key_end`, and the entries of
/// `key_end` itself sort above it.
pub fn key_range_bounds(query: &KeyRangeQuery) -> Result<(Vec<u8>, Vec<u8>)> {
    validate_bound(query.key_start(), "key range start")?;
    validate_bound(query.key_end(), "key range end")?;
    validate_bound(query.slice().column_start(), "column range start")?;
    validate_bound(query.slice().column_end(), "column range end")?;
    Ok((query.key_start().to_vec(), query.key_end().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(bytes: &[u8]) -> StaticBuffer {
        StaticBuffer::from_slice(bytes)
    }

    #[test]
    fn entry_key_round_trip() {
        let raw = encode_entry_key(&buf(b"vertex:1"), &buf(b"name"));
        assert_eq!(raw, b"vertex:1\x00name");
        let (row, column) = decode_entry_key(&raw).unwrap();
        assert_eq!(row, buf(b"vertex:1"));
        assert_eq!(column, buf(b"name"));
    }

    #[test]
    fn decode_requires_a_separator() {
        assert!(matches!(
            decode_entry_key(b"no-separator-here"),
            Err(StorageError::IllegalArgument(_))
        ));
    }

    #[test]
    fn components_reject_separator_and_empty() {
        assert!(validate_component(&buf(b"a\x00b"), "row key").is_err());
        assert!(validate_component(&StaticBuffer::empty(), "row key").is_err());
        assert!(validate_component(&buf(b"plain"), "row key").is_ok());
    }

    #[test]
    fn bounds_may_be_empty_but_not_contain_separator() {
        assert!(validate_bound(&StaticBuffer::empty(), "bound").is_ok());
        assert!(validate_bound(&buf(b"\x00"), "bound").is_err());
    }

    #[test]
    fn row_scan_range_shares_the_row_prefix() {
        let slice = SliceQuery::new("col2", "col4");
        let (start, end) = row_scan_range(&buf(b"r"), &slice).unwrap();
        assert_eq!(start, b"r\x00col2");
        assert_eq!(end, b"r\x00col4");
    }

    #[test]
    fn encoded_order_follows_row_then_column() {
        // "ab" is a strict prefix of "abc"; with a 0x00 separator all of
        // "ab"'s entries still sort before any of "abc"'s.
        let ab_high = encode_entry_key(&buf(b"ab"), &buf(&[0xff]));
        let abc_low = encode_entry_key(&buf(b"abc"), &buf(&[0x01]));
        assert!(ab_high < abc_low);
    }

    #[test]
    fn empty_column_bound_encodes_to_the_prefix() {
        let slice = SliceQuery::new(StaticBuffer::empty(), StaticBuffer::from("~"));
        let (start, end) = row_scan_range(&buf(b"k"), &slice).unwrap();
        assert_eq!(start, b"k\x00");
        assert_eq!(end, b"k\x00~");
    }
}
