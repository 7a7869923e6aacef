use kvt_store::{
    EncodingMode, Entry, KvtConfig, KvtStoreManager, KvtTransaction, SliceQuery, StaticBuffer,
    StorageError,
};

fn open_manager(encoding: EncodingMode) -> KvtStoreManager {
    let config = KvtConfig {
        encoding,
        ..Default::default()
    };
    KvtStoreManager::new(config, kvt_inproc::vtable()).expect("manager must initialize")
}

fn buf(text: &str) -> StaticBuffer {
    StaticBuffer::from(text)
}

fn entry(column: &str, value: &str) -> Entry {
    Entry::new(column, value)
}

/// Commits `additions` to row `key` in one transaction.
fn put_row(manager: &KvtStoreManager, store_name: &str, key: &str, additions: &[Entry]) {
    let store = manager.open_database(store_name).unwrap();
    let tx = manager.begin_transaction().unwrap();
    store.mutate(&tx, &buf(key), additions, &[]).unwrap();
    tx.commit().unwrap();
}

fn read_row(manager: &KvtStoreManager, store_name: &str, key: &str, query: &SliceQuery) -> Vec<Entry> {
    let store = manager.open_database(store_name).unwrap();
    let tx = manager.begin_transaction().unwrap();
    let entries = store.get_slice(&tx, &buf(key), query).unwrap();
    tx.commit().unwrap();
    entries
}

const BOTH_MODES: [EncodingMode; 2] = [EncodingMode::CompositeKey, EncodingMode::PackedColumns];

#[test]
fn single_put_get() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        put_row(&manager, "edgestore", "vertex:1", &[entry("name", "Alice")]);

        let entries = read_row(&manager, "edgestore", "vertex:1", &SliceQuery::new("", "~"));
        assert_eq!(entries, vec![entry("name", "Alice")], "mode {mode:?}");
    }
}

#[test]
fn round_trip_returns_entries_in_column_order() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        // Insert out of order; reads must come back sorted.
        put_row(
            &manager,
            "edgestore",
            "r",
            &[entry("c3", "v3"), entry("c1", "v1"), entry("c2", "v2")],
        );

        let entries = read_row(&manager, "edgestore", "r", &SliceQuery::new("c1", "c4"));
        assert_eq!(
            entries,
            vec![entry("c1", "v1"), entry("c2", "v2"), entry("c3", "v3")],
            "mode {mode:?}"
        );
    }
}

#[test]
fn slice_boundaries_are_half_open() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        put_row(
            &manager,
            "edgestore",
            "r",
            &[
                entry("col1", "v1"),
                entry("col2", "v2"),
                entry("col3", "v3"),
                entry("col4", "v4"),
                entry("col5", "v5"),
            ],
        );

        let entries = read_row(&manager, "edgestore", "r", &SliceQuery::new("col2", "col4"));
        assert_eq!(
            entries,
            vec![entry("col2", "v2"), entry("col3", "v3")],
            "mode {mode:?}"
        );
    }
}

#[test]
fn limit_returns_the_smallest_columns() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        put_row(
            &manager,
            "edgestore",
            "r",
            &[
                entry("col1", "v1"),
                entry("col2", "v2"),
                entry("col3", "v3"),
                entry("col4", "v4"),
                entry("col5", "v5"),
            ],
        );

        let limited = SliceQuery::new("col1", "col9").with_limit(2);
        let entries = read_row(&manager, "edgestore", "r", &limited);
        assert_eq!(
            entries,
            vec![entry("col1", "v1"), entry("col2", "v2")],
            "mode {mode:?}"
        );
    }
}

#[test]
fn empty_and_reversed_ranges_yield_nothing() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        put_row(&manager, "edgestore", "r", &[entry("col2", "v2")]);

        assert!(
            read_row(&manager, "edgestore", "r", &SliceQuery::new("col2", "col2")).is_empty(),
            "mode {mode:?}"
        );
        assert!(
            read_row(&manager, "edgestore", "r", &SliceQuery::new("col9", "col2")).is_empty(),
            "mode {mode:?}"
        );
    }
}

#[test]
fn absent_rows_read_as_empty() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        manager.open_database("edgestore").unwrap();
        assert!(
            read_row(&manager, "edgestore", "nobody", &SliceQuery::new("", "~")).is_empty(),
            "mode {mode:?}"
        );
    }
}

#[test]
fn delete_then_readd_matches_a_single_add() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        let store = manager.open_database("edgestore").unwrap();
        let key = buf("r");

        let tx = manager.begin_transaction().unwrap();
        store.mutate(&tx, &key, &[entry("c", "v")], &[]).unwrap();
        store.mutate(&tx, &key, &[], &[buf("c")]).unwrap();
        store.mutate(&tx, &key, &[entry("c", "v")], &[]).unwrap();
        tx.commit().unwrap();

        let entries = read_row(&manager, "edgestore", "r", &SliceQuery::new("", "~"));
        assert_eq!(entries, vec![entry("c", "v")], "mode {mode:?}");
    }
}

#[test]
fn additions_win_over_deletions_in_one_call() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        put_row(
            &manager,
            "edgestore",
            "r",
            &[entry("c1", "a"), entry("c2", "b"), entry("c3", "c")],
        );

        let store = manager.open_database("edgestore").unwrap();
        let tx = manager.begin_transaction().unwrap();
        store
            .mutate(
                &tx,
                &buf("r"),
                &[entry("c2", "B"), entry("c4", "d")],
                &[buf("c2"), buf("c3")],
            )
            .unwrap();
        tx.commit().unwrap();

        let entries = read_row(&manager, "edgestore", "r", &SliceQuery::new("", "~"));
        assert_eq!(
            entries,
            vec![entry("c1", "a"), entry("c2", "B"), entry("c4", "d")],
            "mode {mode:?}"
        );
    }
}

#[test]
fn a_row_losing_all_columns_is_absent() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        put_row(
            &manager,
            "edgestore",
            "r",
            &[entry("c1", "v1"), entry("c2", "v2")],
        );

        let store = manager.open_database("edgestore").unwrap();
        let tx = manager.begin_transaction().unwrap();
        store
            .mutate(&tx, &buf("r"), &[], &[buf("c1"), buf("c2")])
            .unwrap();
        tx.commit().unwrap();

        assert!(
            read_row(&manager, "edgestore", "r", &SliceQuery::new("", "~")).is_empty(),
            "mode {mode:?}"
        );
    }
}

#[test]
fn empty_mutate_is_a_no_op() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        let store = manager.open_database("edgestore").unwrap();
        let tx = manager.begin_transaction().unwrap();
        store.mutate(&tx, &buf("r"), &[], &[]).unwrap();
        tx.commit().unwrap();
        assert!(!manager.exists().unwrap(), "mode {mode:?}");
    }
}

#[test]
fn composite_encoding_rejects_separator_and_empty_inputs() {
    let manager = open_manager(EncodingMode::CompositeKey);
    let store = manager.open_database("edgestore").unwrap();
    let tx = manager.begin_transaction().unwrap();

    let key_with_sep = StaticBuffer::from_slice(b"bad\x00key");
    let err = store
        .mutate(&tx, &key_with_sep, &[entry("c", "v")], &[])
        .unwrap_err();
    assert!(matches!(err, StorageError::IllegalArgument(_)));

    let col_with_sep = Entry::new(StaticBuffer::from_slice(b"c\x00ol"), buf("v"));
    let err = store.mutate(&tx, &buf("r"), &[col_with_sep], &[]).unwrap_err();
    assert!(matches!(err, StorageError::IllegalArgument(_)));

    let err = store
        .mutate(&tx, &StaticBuffer::empty(), &[entry("c", "v")], &[])
        .unwrap_err();
    assert!(matches!(err, StorageError::IllegalArgument(_)));

    let empty_col = Entry::new(StaticBuffer::empty(), buf("v"));
    let err = store.mutate(&tx, &buf("r"), &[empty_col], &[]).unwrap_err();
    assert!(matches!(err, StorageError::IllegalArgument(_)));

    // None of the rejected calls may have touched state.
    tx.commit().unwrap();
    assert!(!manager.exists().unwrap());
}

#[test]
fn packed_encoding_accepts_any_bytes() {
    let manager = open_manager(EncodingMode::PackedColumns);
    let store = manager.open_database("edgestore").unwrap();
    let key = StaticBuffer::from_slice(b"row\x00with\x1fseparators");
    let column = StaticBuffer::from_slice(b"col\x00umn");
    let value = StaticBuffer::from_slice(&[0x00, 0xff, 0x1f]);

    let tx = manager.begin_transaction().unwrap();
    store
        .mutate(&tx, &key, &[Entry::new(column.clone(), value.clone())], &[])
        .unwrap();
    tx.commit().unwrap();

    let tx = manager.begin_transaction().unwrap();
    let entries = store
        .get_slice(
            &tx,
            &key,
            &SliceQuery::new(StaticBuffer::empty(), StaticBuffer::from_slice(&[0xff])),
        )
        .unwrap();
    tx.commit().unwrap();
    assert_eq!(entries, vec![Entry::new(column, value)]);
}

#[test]
fn autocommit_allows_single_operations_only_in_composite_mode() {
    let manager = open_manager(EncodingMode::CompositeKey);
    let store = manager.open_database("edgestore").unwrap();
    let auto = KvtTransaction::autocommit();

    store.mutate(&auto, &buf("r"), &[entry("c1", "v1")], &[]).unwrap();
    let err = store
        .mutate(&auto, &buf("r"), &[entry("c2", "v2"), entry("c3", "v3")], &[])
        .unwrap_err();
    assert!(matches!(err, StorageError::IllegalArgument(_)));

    let entries = read_row(&manager, "edgestore", "r", &SliceQuery::new("", "~"));
    assert_eq!(entries, vec![entry("c1", "v1")]);
}

#[test]
fn autocommit_mutate_is_unrestricted_in_packed_mode() {
    let manager = open_manager(EncodingMode::PackedColumns);
    let store = manager.open_database("edgestore").unwrap();
    let auto = KvtTransaction::autocommit();

    store
        .mutate(
            &auto,
            &buf("r"),
            &[entry("c1", "v1"), entry("c2", "v2")],
            &[],
        )
        .unwrap();

    let entries = read_row(&manager, "edgestore", "r", &SliceQuery::new("", "~"));
    assert_eq!(entries, vec![entry("c1", "v1"), entry("c2", "v2")]);
}

#[test]
fn multi_key_slices_cover_every_requested_key() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        put_row(&manager, "edgestore", "k1", &[entry("c", "v1")]);
        put_row(&manager, "edgestore", "k3", &[entry("c", "v3")]);

        let store = manager.open_database("edgestore").unwrap();
        let tx = manager.begin_transaction().unwrap();
        let keys = [buf("k1"), buf("k2"), buf("k3")];
        let results = store
            .get_slice_multi(&tx, &keys, &SliceQuery::new("", "~"))
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(results.len(), 3, "mode {mode:?}");
        assert_eq!(results[&buf("k1")], vec![entry("c", "v1")]);
        assert!(results[&buf("k2")].is_empty());
        assert_eq!(results[&buf("k3")], vec![entry("c", "v3")]);
    }
}

#[test]
fn key_bound_slices_match_their_unbound_form() {
    let manager = open_manager(EncodingMode::CompositeKey);
    put_row(&manager, "edgestore", "k1", &[entry("c", "v")]);

    let store = manager.open_database("edgestore").unwrap();
    let tx = manager.begin_transaction().unwrap();
    let query = kvt_store::KeySliceQuery::new("k1", SliceQuery::new("", "~"));
    let bound = store.get_key_slice(&tx, &query).unwrap();
    let unbound = store.get_slice(&tx, &buf("k1"), &SliceQuery::new("", "~")).unwrap();
    tx.commit().unwrap();
    assert_eq!(bound, unbound);
    assert_eq!(bound, vec![entry("c", "v")]);
}

#[test]
fn multi_slices_return_one_map_per_query() {
    let manager = open_manager(EncodingMode::CompositeKey);
    put_row(
        &manager,
        "edgestore",
        "k1",
        &[entry("a1", "x"), entry("b1", "y")],
    );

    let store = manager.open_database("edgestore").unwrap();
    let tx = manager.begin_transaction().unwrap();
    let query = kvt_store::MultiSlicesQuery {
        keys: vec![buf("k1")],
        queries: vec![SliceQuery::new("a", "b"), SliceQuery::new("b", "c")],
    };
    let results = store.get_multi_slices(&tx, &query).unwrap();
    tx.commit().unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0][&buf("k1")], vec![entry("a1", "x")]);
    assert_eq!(results[1][&buf("k1")], vec![entry("b1", "y")]);
}

#[test]
fn acquire_lock_is_a_validated_no_op() {
    let manager = open_manager(EncodingMode::CompositeKey);
    let store = manager.open_database("edgestore").unwrap();
    let tx = manager.begin_transaction().unwrap();
    store
        .acquire_lock(&tx, &buf("r"), &buf("c"), Some(&buf("v")))
        .unwrap();
    tx.commit().unwrap();

    let err = store
        .acquire_lock(&tx, &buf("r"), &buf("c"), None)
        .unwrap_err();
    assert!(matches!(err, StorageError::IllegalState(_)));
}

#[test]
fn values_may_be_empty() {
    for mode in BOTH_MODES {
        let manager = open_manager(mode);
        put_row(&manager, "edgestore", "r", &[entry("flag", "")]);
        let entries = read_row(&manager, "edgestore", "r", &SliceQuery::new("", "~"));
        assert_eq!(entries, vec![entry("flag", "")], "mode {mode:?}");
    }
}
