use once_cell::sync::Lazy;
use prometheus::{
    exponential_buckets, register_histogram_vec, register_int_counter_vec, HistogramVec,
    IntCounterVec,
};

pub static KVT_SLICE_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        // metric name
        "kvt_store_slice_latency_seconds",
        // metric description
        "Slice query latency in seconds",
        // metric labels (dimensions)
        &["table"],
        exponential_buckets(/*start=*/ 1e-6, /*factor=*/ 2.0, /*count=*/ 22).unwrap(),
    )
    .unwrap()
});

pub static KVT_SLICE_BYTES: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        // metric name
        "kvt_store_slice_bytes",
        // metric description
        "Bytes returned per slice query",
        // metric labels (dimensions)
        &["table"]
    )
    .unwrap()
});

pub static KVT_MUTATE_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        // metric name
        "kvt_store_mutate_latency_seconds",
        // metric description
        "Mutate call latency in seconds",
        // metric labels (dimensions)
        &["table"],
        exponential_buckets(/*start=*/ 1e-6, /*factor=*/ 2.0, /*count=*/ 22).unwrap(),
    )
    .unwrap()
});

pub static KVT_MUTATE_BYTES: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        // metric name
        "kvt_store_mutate_bytes",
        // metric description
        "Bytes written per mutate call",
        // metric labels (dimensions)
        &["table"]
    )
    .unwrap()
});

pub static KVT_SCAN_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        // metric name
        "kvt_store_key_scan_latency_seconds",
        // metric description
        "Key scan latency in seconds",
        // metric labels (dimensions)
        &["table"],
        exponential_buckets(/*start=*/ 1e-6, /*factor=*/ 2.0, /*count=*/ 22).unwrap(),
    )
    .unwrap()
});

pub static KVT_DELETES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "kvt_store_deletes",
        "Column deletions issued through mutate",
        &["table"]
    )
    .unwrap()
});
