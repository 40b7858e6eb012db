use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

lazy_static::lazy_static! {
    pub static ref CONNECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "milvus_similarity_connections_total", "Connection attempts", &["status"]
    ).unwrap();
    pub static ref INSERTED_ROWS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "milvus_similarity_inserted_rows_total", "Rows inserted", &["collection"]
    ).unwrap();
    pub static ref SKIPPED_ROWS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "milvus_similarity_skipped_rows_total", "Rows skipped because their ID already existed", &["collection"]
    ).unwrap();
    pub static ref DELETE_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "milvus_similarity_delete_requests_total", "Delete requests", &["collection"]
    ).unwrap();
    pub static ref SEARCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "milvus_similarity_searches_total", "Remote searches", &["collection"]
    ).unwrap();
    pub static ref SEARCH_DURATION: HistogramVec = register_histogram_vec!(
        "milvus_similarity_search_duration_seconds", "Remote search duration", &["collection"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "milvus_similarity_errors_total", "Failed operations", &["operation", "code"]
    ).unwrap();
}

pub fn init() {
    lazy_static::initialize(&CONNECTIONS_TOTAL);
    lazy_static::initialize(&INSERTED_ROWS_TOTAL);
    lazy_static::initialize(&SKIPPED_ROWS_TOTAL);
    lazy_static::initialize(&DELETE_REQUESTS_TOTAL);
    lazy_static::initialize(&SEARCHES_TOTAL);
    lazy_static::initialize(&SEARCH_DURATION);
    lazy_static::initialize(&ERRORS_TOTAL);
}

/// Count a failed operation by its error code.
pub fn record_error(operation: &str, err: &crate::error::SimilarityError) {
    ERRORS_TOTAL
        .with_label_values(&[operation, err.code()])
        .inc();
}
