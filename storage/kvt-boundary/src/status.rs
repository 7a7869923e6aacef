//! Integer status codes and table partitioning hints, as they appear on the
//! wire.

/// Result code returned by every engine entry point. `Success` is zero;
/// everything else is a failure the host translates into a typed error.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// The operation completed.
    Success = 0,
    /// A point lookup found no value under the requested key.
    NotFound = 1,
    /// The engine detected a conflict or deadlock; the transaction may be
    /// retried by the consumer.
    ConflictOrDeadlock = 2,
    /// `create_table` was called for a name that already has a table.
    TableAlreadyExists = 3,
    /// The requested partitioning method is not supported by the engine.
    InvalidPartitionMethod = 4,
    /// A batch was applied only partially.
    BatchNotFullySuccess = 5,
    /// A non-retryable engine failure.
    Permanent = 6,
}

impl StatusCode {
    /// Decodes a raw status integer. Unknown codes yield `None`; callers
    /// treat them as permanent failures carrying the raw value.
    pub fn from_raw(raw: i32) -> Option<StatusCode> {
        Some(match raw {
            0 => StatusCode::Success,
            1 => StatusCode::NotFound,
            2 => StatusCode::ConflictOrDeadlock,
            3 => StatusCode::TableAlreadyExists,
            4 => StatusCode::InvalidPartitionMethod,
            5 => StatusCode::BatchNotFullySuccess,
            6 => StatusCode::Permanent,
            _ => return None,
        })
    }

    /// The wire representation of this code.
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Partitioning hint passed to `create_table`.
///
/// Range-partitioned tables support ordered scans across the whole key
/// space; hash-partitioned tables only guarantee point access.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// Keys are ordered; range scans are supported.
    Range = 0,
    /// Keys are distributed by hash; no cross-key ordering.
    Hash = 1,
}

impl Partition {
    /// The wire representation of this hint.
    pub fn as_raw(self) -> u8 {
        self as u8
    }

    /// Decodes the wire representation.
    pub fn from_raw(raw: u8) -> Option<Partition> {
        match raw {
            0 => Some(Partition::Range),
            1 => Some(Partition::Hash),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for raw in 0..7 {
            let code = StatusCode::from_raw(raw).unwrap();
            assert_eq!(code.as_raw(), raw);
        }
        assert_eq!(StatusCode::from_raw(7), None);
        assert_eq!(StatusCode::from_raw(-1), None);
    }

    #[test]
    fn partition_round_trip() {
        assert_eq!(Partition::from_raw(0), Some(Partition::Range));
        assert_eq!(Partition::from_raw(1), Some(Partition::Hash));
        assert_eq!(Partition::from_raw(2), None);
    }
}
