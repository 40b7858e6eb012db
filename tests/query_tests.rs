mod common;

use assert_approx_eq::assert_approx_eq;

use common::assertions::{assert_dimension_mismatch, assert_invalid_argument, assert_not_found};
use common::harness::TestHarness;
use common::vectors::{abc, ids, random_embeddings, strings};

use milvus_similarity::config::MAX_K;
use milvus_similarity::index::{AddOptions, NeighborsRequest, SimilarityIndex};
use milvus_similarity::types::{Neighbors, NeighborsQuery};

async fn seeded(harness: &TestHarness, index: SimilarityIndex) -> SimilarityIndex {
    let (embeddings, sample_ids) = abc();
    index
        .add_to_index(embeddings, sample_ids, None, AddOptions::default())
        .await
        .unwrap();
    harness.live(&["A", "B", "C"]);
    index
}

// ─── Ranking ───

#[tokio::test]
async fn test_nearest_euclidean() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let one = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 1))
        .await
        .unwrap();
    assert_eq!(one.single_ids().unwrap(), ["A"]);

    let two = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 2))
        .await
        .unwrap();
    assert_eq!(two.single_ids().unwrap(), ["A", "C"]);
}

#[tokio::test]
async fn test_euclidean_dists_are_squared() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 3).with_dists())
        .await
        .unwrap();

    let Neighbors::Single { ids, dists } = result else {
        panic!("expected single-query neighbors");
    };
    assert_eq!(ids, vec!["A", "C", "B"]);
    let dists = dists.unwrap();
    assert_approx_eq!(dists[0], 0.0, 1e-6);
    assert_approx_eq!(dists[1], 0.08, 1e-6);
    assert_approx_eq!(dists[2], 2.0, 1e-6);
}

#[tokio::test]
async fn test_dotproduct_highest_first() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.dotproduct_index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 3).with_dists())
        .await
        .unwrap();

    let Neighbors::Single { ids, dists } = result else {
        panic!("expected single-query neighbors");
    };
    assert_eq!(ids, vec!["A", "C", "B"]);
    let dists = dists.unwrap();
    assert_approx_eq!(dists[0], 1.0, 1e-6);
    assert_approx_eq!(dists[1], 0.8, 1e-6);
    assert_approx_eq!(dists[2], 0.0, 1e-6);
}

#[tokio::test]
async fn test_dists_omitted_by_default() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 1))
        .await
        .unwrap();
    assert!(matches!(result, Neighbors::Single { dists: None, .. }));
}

#[tokio::test]
async fn test_k_larger_than_index() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(vec![0.0, 1.0], 10))
        .await
        .unwrap();
    assert_eq!(result.single_ids().unwrap(), ["B", "C", "A"]);
}

// ─── Scoping ───

#[tokio::test]
async fn test_results_scoped_to_live_ids() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;
    harness.live(&["B", "C"]);

    let result = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 2))
        .await
        .unwrap();
    assert_eq!(result.single_ids().unwrap(), ["C", "B"]);
}

#[tokio::test]
async fn test_no_live_ids_no_neighbors() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;
    harness.live(&[]);

    let result = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 2))
        .await
        .unwrap();
    assert!(result.single_ids().unwrap().is_empty());
}

#[tokio::test]
async fn test_patch_queries_scoped_to_live_labels() {
    let harness = TestHarness::new();
    let index = harness.patch_index().await;
    index
        .add_to_index(
            vec![vec![1.0, 0.0], vec![0.9, 0.0], vec![0.0, 1.0]],
            strings(&["s1", "s1", "s2"]),
            Some(strings(&["p1", "p2", "p3"])),
            AddOptions::default(),
        )
        .await
        .unwrap();
    harness.live(&["s1", "s2"]);
    harness.live_labels(&["p2", "p3"]);

    let result = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 3))
        .await
        .unwrap();
    assert_eq!(result.single_ids().unwrap(), ["p2", "p3"]);
}

#[tokio::test]
async fn test_query_before_collection_exists() {
    let harness = TestHarness::new();
    let index = harness.index().await;
    harness.live(&["A"]);

    let single = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 1).with_dists())
        .await
        .unwrap();
    assert_eq!(
        single,
        Neighbors::Single {
            ids: Vec::new(),
            dists: Some(Vec::new()),
        }
    );

    let batch = index
        .kneighbors(NeighborsRequest::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 1))
        .await
        .unwrap();
    assert_eq!(batch.batch_ids().unwrap(), [Vec::<String>::new(), Vec::new()]);
}

// ─── Query shapes ───

#[tokio::test]
async fn test_batch_of_vectors() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 1).with_dists())
        .await
        .unwrap();

    let Neighbors::Batch { ids, dists } = result else {
        panic!("expected batch neighbors");
    };
    assert_eq!(ids, vec![strings(&["A"]), strings(&["B"])]);
    let dists = dists.unwrap();
    assert_eq!(dists.len(), 2);
    assert_approx_eq!(dists[1][0], 0.0, 1e-6);
}

#[tokio::test]
async fn test_mean_aggregation_collapses_batch() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    // Mean of the two queries is exactly C
    let result = index
        .kneighbors(
            NeighborsRequest::new(vec![vec![1.0, 0.0], vec![0.6, 0.4]], 1)
                .with_aggregation("mean")
                .with_dists(),
        )
        .await
        .unwrap();

    let Neighbors::Single { ids, dists } = result else {
        panic!("expected single-query neighbors");
    };
    assert_eq!(ids, vec!["C"]);
    assert_approx_eq!(dists.unwrap()[0], 0.0, 1e-6);
}

#[tokio::test]
async fn test_query_by_id() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new("B", 2))
        .await
        .unwrap();
    assert_eq!(result.single_ids().unwrap(), ["B", "C"]);
}

#[tokio::test]
async fn test_query_by_ids() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(strings(&["A", "B"]), 1))
        .await
        .unwrap();
    assert_eq!(
        result.batch_ids().unwrap(),
        [strings(&["A"]), strings(&["B"])]
    );
}

#[tokio::test]
async fn test_query_by_unknown_id() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(strings(&["A", "Z"]), 1))
        .await;
    assert_not_found(&result, 1, "Z");
}

#[tokio::test]
async fn test_query_larger_index() {
    let harness = TestHarness::new();
    let index = harness.index().await;
    let embeddings = random_embeddings(200, 16, 31);
    let sample_ids = ids("s", 200);
    index
        .add_to_index(
            embeddings.clone(),
            sample_ids.clone(),
            None,
            AddOptions {
                batch_size: 64,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    harness
        .samples
        .set_sample_ids(sample_ids.iter().cloned());

    // Every stored vector is its own nearest neighbor
    for i in [0, 57, 199] {
        let result = index
            .kneighbors(NeighborsRequest::new(embeddings[i].clone(), 5))
            .await
            .unwrap();
        let found = result.single_ids().unwrap();
        assert_eq!(found.len(), 5);
        assert_eq!(found[0], sample_ids[i]);
    }
}

// ─── Validation ───

#[tokio::test]
async fn test_k_out_of_range() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let too_big = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], MAX_K + 1))
        .await;
    assert_invalid_argument(&too_big);

    let zero = index.kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 0)).await;
    assert_invalid_argument(&zero);

    let missing = index
        .kneighbors(NeighborsRequest {
            query: Some(NeighborsQuery::Vector(vec![1.0, 0.0])),
            ..Default::default()
        })
        .await;
    assert_invalid_argument(&missing);
}

#[tokio::test]
async fn test_max_k_accepted() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], MAX_K))
        .await
        .unwrap();
    assert_eq!(result.single_ids().unwrap().len(), 3);
}

#[tokio::test]
async fn test_reverse_rejected() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0], 1).reversed())
        .await;
    assert_invalid_argument(&result);
}

#[tokio::test]
async fn test_unknown_aggregation_rejected() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(
            NeighborsRequest::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 1)
                .with_aggregation("max"),
        )
        .await;
    assert_invalid_argument(&result);
}

#[tokio::test]
async fn test_full_index_query_rejected() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest {
            k: Some(1),
            ..Default::default()
        })
        .await;
    assert_invalid_argument(&result);
}

#[tokio::test]
async fn test_query_dimension_mismatch() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(vec![1.0, 0.0, 0.0], 1))
        .await;
    assert_dimension_mismatch(&result, 2, 3);
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let harness = TestHarness::new();
    let index = seeded(&harness, harness.index().await).await;

    let result = index
        .kneighbors(NeighborsRequest::new(Vec::<Vec<f32>>::new(), 1))
        .await;
    assert_invalid_argument(&result);
}
