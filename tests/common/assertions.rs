use std::collections::HashMap;

use assert_approx_eq::assert_approx_eq;

use milvus_similarity::error::SimilarityError;
use milvus_similarity::types::EmbeddingsResult;

/// Assert two vectors are element-wise equal within 1e-5.
pub fn assert_vectors_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "vector lengths differ: {actual:?} vs {expected:?}"
    );
    for (a, e) in actual.iter().zip(expected) {
        assert_approx_eq!(*a, *e, 1e-5);
    }
}

/// Index an embeddings result by sample ID. Panics on repeated sample IDs.
pub fn by_sample_id(result: &EmbeddingsResult) -> HashMap<String, Vec<f32>> {
    let mut map = HashMap::new();
    for (id, v) in result.sample_ids.iter().zip(&result.embeddings) {
        assert!(
            map.insert(id.clone(), v.clone()).is_none(),
            "sample ID '{id}' returned more than once"
        );
    }
    map
}

/// Assert returned IDs match `expected`, ignoring order.
pub fn assert_same_ids(actual: &[String], expected: &[&str]) {
    let mut actual: Vec<&str> = actual.iter().map(String::as_str).collect();
    let mut expected = expected.to_vec();
    actual.sort_unstable();
    expected.sort_unstable();
    assert_eq!(actual, expected, "ID sets differ");
}

pub fn assert_invalid_argument<T: std::fmt::Debug>(result: &Result<T, SimilarityError>) {
    match result {
        Err(SimilarityError::InvalidArgument(_)) => {}
        other => panic!("expected InvalidArgument error, got: {other:?}"),
    }
}

pub fn assert_unsupported_query<T: std::fmt::Debug>(result: &Result<T, SimilarityError>) {
    match result {
        Err(SimilarityError::UnsupportedQuery(_)) => {}
        other => panic!("expected UnsupportedQuery error, got: {other:?}"),
    }
}

/// Assert a `NotFound` error naming `count` IDs with `example` among them.
pub fn assert_not_found<T: std::fmt::Debug>(
    result: &Result<T, SimilarityError>,
    count: usize,
    example: &str,
) {
    match result {
        Err(SimilarityError::NotFound { count: c, example: e }) => {
            assert_eq!(*c, count, "unexpected missing count");
            assert_eq!(e, example, "unexpected example ID");
        }
        other => panic!("expected NotFound error, got: {other:?}"),
    }
}

pub fn assert_duplicate_id<T: std::fmt::Debug>(
    result: &Result<T, SimilarityError>,
    count: usize,
    example: &str,
) {
    match result {
        Err(SimilarityError::DuplicateId { count: c, example: e }) => {
            assert_eq!(*c, count, "unexpected duplicate count");
            assert_eq!(e, example, "unexpected example ID");
        }
        other => panic!("expected DuplicateId error, got: {other:?}"),
    }
}

pub fn assert_dimension_mismatch<T: std::fmt::Debug>(
    result: &Result<T, SimilarityError>,
    expected: usize,
    actual: usize,
) {
    match result {
        Err(SimilarityError::DimensionMismatch {
            expected: e,
            actual: a,
        }) => {
            assert_eq!((*e, *a), (expected, actual));
        }
        other => panic!("expected DimensionMismatch error, got: {other:?}"),
    }
}
