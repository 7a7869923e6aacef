//! The packed-columns encoding: a whole row serialized into one engine
//! value under the bare row key.
//!
//! Wire format, little-endian:
//!
//! ```text
//! u32 count ‖ (u32 col_len ‖ col ‖ u32 val_len ‖ val) × count
//! ```
//!
//! A stored row always has `count > 0`; a row that loses its last column is
//! deleted from the engine instead of being stored empty. Columns are
//! written in strictly ascending order and the deserializer verifies this,
//! so a corrupted or foreign value cannot masquerade as a row.

use std::collections::BTreeMap;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::buffer::StaticBuffer;
use crate::query::{Entry, EntryList};
use crate::{Result, StorageError};

fn encoding_err(detail: impl Into<String>) -> StorageError {
    StorageError::Encoding(detail.into())
}

/// Serializes a non-empty, strictly ascending entry list.
pub fn serialize(entries: &[Entry]) -> Result<Vec<u8>> {
    if entries.is_empty() {
        return Err(encoding_err("refusing to store a row with zero columns"));
    }
    for pair in entries.windows(2) {
        if pair[0].column >= pair[1].column {
            return Err(encoding_err("columns must be strictly ascending"));
        }
    }
    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(entries.len() as u32)
        .map_err(|e| encoding_err(e.to_string()))?;
    for entry in entries {
        out.write_u32::<LittleEndian>(entry.column.len() as u32)
            .map_err(|e| encoding_err(e.to_string()))?;
        out.extend_from_slice(entry.column.as_slice());
        out.write_u32::<LittleEndian>(entry.value.len() as u32)
            .map_err(|e| encoding_err(e.to_string()))?;
        out.extend_from_slice(entry.value.as_slice());
    }
    Ok(out)
}

/// Deserializes a stored row, verifying length prefixes and column order.
pub fn deserialize(bytes: &[u8]) -> Result<EntryList> {
    let mut reader = std::io::Cursor::new(bytes);
    let count = reader
        .read_u32::<LittleEndian>()
        .map_err(|_| encoding_err("truncated column count"))?;
    if count == 0 {
        return Err(encoding_err("stored row has zero columns"));
    }
    let mut entries = Vec::with_capacity(count as usize);
    let mut previous: Option<StaticBuffer> = None;
    for _ in 0..count {
        let column = read_chunk(&mut reader, "column")?;
        let value = read_chunk(&mut reader, "value")?;
        if let Some(prev) = &previous {
            if *prev >= column {
                return Err(encoding_err("stored columns are not strictly ascending"));
            }
        }
        previous = Some(column.clone());
        entries.push(Entry { column, value });
    }
    if reader.position() != bytes.len() as u64 {
        return Err(encoding_err("trailing bytes after the last column"));
    }
    Ok(entries)
}

fn read_chunk(reader: &mut std::io::Cursor<&[u8]>, what: &str) -> Result<StaticBuffer> {
    let len = reader
        .read_u32::<LittleEndian>()
        .map_err(|_| encoding_err(format!("truncated {what} length")))? as usize;
    let remaining = reader.get_ref().len() as u64 - reader.position();
    if (len as u64) > remaining {
        return Err(encoding_err(format!("{what} length exceeds the value")));
    }
    let mut chunk = vec![0u8; len];
    reader
        .read_exact(&mut chunk)
        .map_err(|_| encoding_err(format!("truncated {what} bytes")))?;
    Ok(StaticBuffer::from(chunk))
}

/// Applies one mutate call to a deserialized row: deletions first, then
/// additions, additions winning on a column both sides name. The result is
/// sorted and may be empty, in which case the caller deletes the row.
pub fn merge(existing: EntryList, additions: &[Entry], deletions: &[StaticBuffer]) -> EntryList {
    let mut columns: BTreeMap<StaticBuffer, StaticBuffer> = existing
        .into_iter()
        .map(|entry| (entry.column, entry.value))
        .collect();
    for column in deletions {
        columns.remove(column);
    }
    for entry in additions {
        columns.insert(entry.column.clone(), entry.value.clone());
    }
    columns
        .into_iter()
        .map(|(column, value)| Entry { column, value })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn entry(column: &str, value: &str) -> Entry {
        Entry::new(column, value)
    }

    #[test]
    fn round_trip_preserves_entries() {
        let entries = vec![entry("age", "30"), entry("name", "Alice")];
        let bytes = serialize(&entries).unwrap();
        assert_eq!(deserialize(&bytes).unwrap(), entries);
    }

    #[test]
    fn empty_rows_are_never_stored() {
        assert!(serialize(&[]).is_err());
    }

    #[test]
    fn serializer_rejects_unsorted_and_duplicate_columns() {
        assert!(serialize(&[entry("b", "1"), entry("a", "2")]).is_err());
        assert!(serialize(&[entry("a", "1"), entry("a", "2")]).is_err());
    }

    #[test]
    fn deserializer_rejects_corruption() {
        let good = serialize(&[entry("a", "1"), entry("b", "2")]).unwrap();

        // Truncation mid-value.
        assert!(deserialize(&good[..good.len() - 1]).is_err());

        // Zero count.
        assert!(deserialize(&[0, 0, 0, 0]).is_err());

        // A length prefix pointing past the end.
        let mut oversized = good.clone();
        oversized[4] = 0xff;
        assert!(deserialize(&oversized).is_err());

        // Trailing garbage.
        let mut trailing = good;
        trailing.push(0x7f);
        assert!(deserialize(&trailing).is_err());
    }

    #[test]
    fn deserializer_rejects_unsorted_columns() {
        // Hand-build count=2 with "b" before "a".
        let bytes = serialize(&[entry("a", "1"), entry("b", "2")]).unwrap();
        let swapped = {
            let mut out = Vec::new();
            out.extend_from_slice(&2u32.to_le_bytes());
            for (col, val) in [("b", "2"), ("a", "1")] {
                out.extend_from_slice(&(col.len() as u32).to_le_bytes());
                out.extend_from_slice(col.as_bytes());
                out.extend_from_slice(&(val.len() as u32).to_le_bytes());
                out.extend_from_slice(val.as_bytes());
            }
            out
        };
        assert_eq!(bytes.len(), swapped.len());
        assert!(deserialize(&swapped).is_err());
    }

    #[test]
    fn merge_deletes_then_adds_with_additions_winning() {
        let existing = vec![entry("c1", "a"), entry("c2", "b"), entry("c3", "c")];
        let merged = merge(
            existing,
            &[entry("c2", "B"), entry("c4", "d")],
            &[StaticBuffer::from("c2"), StaticBuffer::from("c3")],
        );
        assert_eq!(
            merged,
            vec![entry("c1", "a"), entry("c2", "B"), entry("c4", "d")]
        );
    }

    #[test]
    fn merge_can_empty_a_row() {
        let existing = vec![entry("only", "x")];
        assert!(merge(existing, &[], &[StaticBuffer::from("only")]).is_empty());
    }

    proptest! {
        #[test]
        fn round_trip_any_sorted_row(
            row in proptest::collection::btree_map(
                proptest::collection::vec(any::<u8>(), 0..24),
                proptest::collection::vec(any::<u8>(), 0..24),
                1..12,
            )
        ) {
            let entries: EntryList = row
                .into_iter()
                .map(|(c, v)| Entry::new(c, v))
                .collect();
            let bytes = serialize(&entries).unwrap();
            prop_assert_eq!(deserialize(&bytes).unwrap(), entries);
        }
    }
}
