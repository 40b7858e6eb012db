//! Remote collection bootstrap and the per-call collection handle.

use tracing::{debug, info, instrument};

use crate::client::{Expr, QueryRow, RemoteClient, SearchRequest};
use crate::config::SimilarityConfig;
use crate::error::{Result, SimilarityError};
use crate::types::{CollectionSchema, InsertColumns, SearchHit, VECTOR_FIELD};

/// A named collection reached through one session.
///
/// Handles are cheap and are rebuilt for every operation; nothing about the
/// remote state is cached in them.
#[derive(Clone, Copy)]
pub struct Collection<'a> {
    client: &'a dyn RemoteClient,
    alias: &'a str,
    name: &'a str,
}

impl<'a> Collection<'a> {
    pub fn new(client: &'a dyn RemoteClient, alias: &'a str, name: &'a str) -> Self {
        Self {
            client,
            alias,
            name,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub async fn exists(&self) -> Result<bool> {
        self.client.has_collection(self.alias, self.name).await
    }

    pub async fn load(&self) -> Result<()> {
        self.client.load_collection(self.alias, self.name).await
    }

    pub async fn schema(&self) -> Result<CollectionSchema> {
        self.client.describe_collection(self.alias, self.name).await
    }

    /// Declared dimension of the vector field.
    pub async fn dimension(&self) -> Result<usize> {
        let schema = self.schema().await?;
        schema.vector_dimension().ok_or_else(|| {
            SimilarityError::Schema(format!(
                "collection {} has no vector field with a dimension",
                self.name
            ))
        })
    }

    pub async fn insert(&self, columns: InsertColumns) -> Result<usize> {
        self.client.insert(self.alias, self.name, columns).await
    }

    pub async fn delete(&self, expr: &Expr) -> Result<()> {
        self.client.delete(self.alias, self.name, expr).await
    }

    pub async fn query(&self, expr: &Expr, output_fields: &[&str]) -> Result<Vec<QueryRow>> {
        self.client
            .query(self.alias, self.name, expr, output_fields)
            .await
    }

    pub async fn search(&self, request: SearchRequest<'_>) -> Result<Vec<SearchHit>> {
        self.client.search(self.alias, self.name, request).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.client.flush(self.alias, self.name).await
    }

    pub async fn num_entities(&self) -> Result<u64> {
        self.client.num_entities(self.alias, self.name).await
    }

    /// Permanently delete the collection and its data.
    pub async fn drop_collection(&self) -> Result<()> {
        self.client.drop_collection(self.alias, self.name).await
    }
}

/// Attach to `name` if it exists: load it and read its vector dimension.
///
/// Returns `None` when the collection is absent; it is created on first
/// ingest, once a dimension is known.
#[instrument(skip(client))]
pub async fn ensure_collection<'a>(
    client: &'a dyn RemoteClient,
    name: &'a str,
    alias: &'a str,
) -> Result<Option<(Collection<'a>, usize)>> {
    let col = Collection::new(client, alias, name);
    if !col.exists().await? {
        debug!("collection does not exist yet");
        return Ok(None);
    }

    col.load().await?;
    let dim = col.dimension().await?;
    debug!(dim, "attached to existing collection");
    Ok(Some((col, dim)))
}

/// Create the pk / vector / sample_id collection, index it and load it.
///
/// Fails with [`SimilarityError::Schema`] if the name is taken; callers check
/// existence first.
#[instrument(skip(client, config), fields(collection = config.collection_name()))]
pub async fn create_collection<'a>(
    client: &'a dyn RemoteClient,
    config: &'a SimilarityConfig,
    alias: &'a str,
    dimension: usize,
) -> Result<Collection<'a>> {
    if dimension == 0 {
        return Err(SimilarityError::InvalidArgument(
            "cannot create a collection for zero-dimensional vectors".to_string(),
        ));
    }

    let name = config.collection_name();
    let col = Collection::new(client, alias, name);
    if col.exists().await? {
        return Err(SimilarityError::Schema(format!(
            "collection {name} already exists"
        )));
    }

    let schema = CollectionSchema::for_embeddings(dimension);
    client
        .create_collection(alias, name, &schema, config.consistency_level())
        .await?;
    client
        .create_index(alias, name, VECTOR_FIELD, config.index_params())
        .await?;
    col.load().await?;

    info!(
        dimension,
        consistency = %config.consistency_level(),
        metric = %config.metric(),
        "created collection"
    );
    Ok(col)
}
