use crate::codec::EncodingMode;

/// The capability bits a manager advertises to its consumer.
///
/// The consumer is expected to gate its query plans on these flags rather
/// than probing operations; an operation a feature flag rules out fails
/// with `IllegalArgument`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreFeatures {
    /// Key-range scans in ascending key order are supported.
    pub ordered_scan: bool,
    /// Full-table key enumeration is supported.
    pub unordered_scan: bool,
    /// Row keys are stored and scanned in byte order.
    pub key_ordered: bool,
    /// Operations participate in consumer-controlled transactions.
    pub transactional: bool,
    /// Writes take engine-side locks (pessimistic concurrency control).
    pub locking: bool,
    /// Optimistic locking is offered. Always false here; the engine locks
    /// pessimistically.
    pub optimistic_locking: bool,
    /// Multi-store mutation batches are supported.
    pub batch_mutation: bool,
    /// Several slices can be evaluated per call.
    pub multi_query: bool,
    /// The engine persists data across restarts.
    pub persists: bool,
    /// The engine is distributed.
    pub distributed: bool,
    /// Per-operation timestamps. Not supported.
    pub timestamps: bool,
    /// Store-level time-to-live. Not supported.
    pub store_ttl: bool,
    /// Cell-level time-to-live. Not supported.
    pub cell_ttl: bool,
    /// Cell-level visibility labels. Not supported.
    pub visibility: bool,
}

impl StoreFeatures {
    /// The feature set for the given encoding. Durability and distribution
    /// are properties of the engine behind the boundary and are passed
    /// through.
    pub fn for_mode(mode: EncodingMode, persists: bool, distributed: bool) -> Self {
        let ordered = mode == EncodingMode::CompositeKey;
        StoreFeatures {
            ordered_scan: ordered,
            unordered_scan: true,
            key_ordered: ordered,
            transactional: true,
            locking: true,
            optimistic_locking: false,
            batch_mutation: true,
            multi_query: true,
            persists,
            distributed,
            timestamps: false,
            store_ttl: false,
            cell_ttl: false,
            visibility: false,
        }
    }
}
