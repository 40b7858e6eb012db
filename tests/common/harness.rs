use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use milvus_similarity::client::{
    Expr, MemoryClient, MemoryStore, QueryRow, RemoteClient, SearchRequest,
};
use milvus_similarity::config::{IndexParams, SimilarityConfig, SimilarityParams};
use milvus_similarity::error::{Result, SimilarityError};
use milvus_similarity::host::LiveIds;
use milvus_similarity::index::SimilarityIndex;
use milvus_similarity::types::{
    CollectionSchema, ConsistencyLevel, InsertColumns, SearchHit,
};

/// One in-process server, one host view and a unique collection name per test.
pub struct TestHarness {
    pub client: Arc<MemoryClient>,
    pub samples: Arc<LiveIds>,
    collection: String,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// A harness whose client talks to an existing `store`.
    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            client: Arc::new(MemoryClient::with_store(store)),
            samples: Arc::new(LiveIds::new()),
            collection: format!("test_{}", &suffix[..12]),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Params for this harness' collection. Strong consistency keeps reads
    /// deterministic.
    pub fn params(&self, metric: &str) -> SimilarityParams {
        SimilarityParams {
            metric: metric.to_string(),
            collection_name: self.collection.clone(),
            consistency_level: ConsistencyLevel::Strong,
            ..Default::default()
        }
    }

    pub async fn index(&self) -> SimilarityIndex {
        self.index_with(self.params("euclidean")).await
    }

    pub async fn dotproduct_index(&self) -> SimilarityIndex {
        self.index_with(self.params("dotproduct")).await
    }

    /// An index keyed by patch (label) IDs.
    pub async fn patch_index(&self) -> SimilarityIndex {
        self.index_with(SimilarityParams {
            patches_field: Some("detections".to_string()),
            ..self.params("euclidean")
        })
        .await
    }

    pub async fn index_with(&self, params: SimilarityParams) -> SimilarityIndex {
        let config = SimilarityConfig::new(params).expect("invalid test config");
        SimilarityIndex::new(
            self.samples.clone(),
            Arc::new(config),
            "test_brain",
            self.client.clone(),
        )
        .await
        .expect("failed to open index")
    }

    /// Replace the host's live sample IDs.
    pub fn live(&self, ids: &[&str]) {
        self.samples.set_sample_ids(ids.iter().copied());
    }

    /// Replace the host's live patch IDs.
    pub fn live_labels(&self, ids: &[&str]) {
        self.samples.set_label_ids(ids.iter().copied());
    }

    /// Rows stored remotely, duplicates included.
    pub fn row_count(&self) -> usize {
        self.client.store().row_count(&self.collection).unwrap_or(0)
    }

    pub fn collection_exists(&self) -> bool {
        self.client
            .store()
            .collection_names()
            .iter()
            .any(|n| n == &self.collection)
    }
}

/// Delegates to a [`MemoryClient`] but fails every insert after the first
/// `inserts_before_failure` succeed.
pub struct FlakyClient {
    inner: MemoryClient,
    inserts_before_failure: usize,
    inserts: AtomicUsize,
}

impl FlakyClient {
    pub fn new(inner: MemoryClient, inserts_before_failure: usize) -> Self {
        Self {
            inner,
            inserts_before_failure,
            inserts: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        self.inner.store()
    }
}

#[async_trait]
impl RemoteClient for FlakyClient {
    async fn connect(&self, alias: &str, uri: &str, user: &str, password: &str) -> Result<()> {
        self.inner.connect(alias, uri, user, password).await
    }

    async fn disconnect(&self, alias: &str) -> Result<()> {
        self.inner.disconnect(alias).await
    }

    async fn has_collection(&self, alias: &str, name: &str) -> Result<bool> {
        self.inner.has_collection(alias, name).await
    }

    async fn create_collection(
        &self,
        alias: &str,
        name: &str,
        schema: &CollectionSchema,
        consistency: ConsistencyLevel,
    ) -> Result<()> {
        self.inner
            .create_collection(alias, name, schema, consistency)
            .await
    }

    async fn describe_collection(&self, alias: &str, name: &str) -> Result<CollectionSchema> {
        self.inner.describe_collection(alias, name).await
    }

    async fn create_index(
        &self,
        alias: &str,
        name: &str,
        field: &str,
        params: &IndexParams,
    ) -> Result<()> {
        self.inner.create_index(alias, name, field, params).await
    }

    async fn load_collection(&self, alias: &str, name: &str) -> Result<()> {
        self.inner.load_collection(alias, name).await
    }

    async fn drop_collection(&self, alias: &str, name: &str) -> Result<()> {
        self.inner.drop_collection(alias, name).await
    }

    async fn insert(&self, alias: &str, name: &str, columns: InsertColumns) -> Result<usize> {
        if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.inserts_before_failure {
            return Err(SimilarityError::Remote("injected insert failure".to_string()));
        }
        self.inner.insert(alias, name, columns).await
    }

    async fn delete(&self, alias: &str, name: &str, expr: &Expr) -> Result<()> {
        self.inner.delete(alias, name, expr).await
    }

    async fn query(
        &self,
        alias: &str,
        name: &str,
        expr: &Expr,
        output_fields: &[&str],
    ) -> Result<Vec<QueryRow>> {
        self.inner.query(alias, name, expr, output_fields).await
    }

    async fn search(
        &self,
        alias: &str,
        name: &str,
        request: SearchRequest<'_>,
    ) -> Result<Vec<SearchHit>> {
        self.inner.search(alias, name, request).await
    }

    async fn flush(&self, alias: &str, name: &str) -> Result<()> {
        self.inner.flush(alias, name).await
    }

    async fn num_entities(&self, alias: &str, name: &str) -> Result<u64> {
        self.inner.num_entities(alias, name).await
    }
}
