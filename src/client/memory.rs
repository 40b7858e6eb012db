//! In-process vector-database service.
//!
//! Mirrors the behavior the index relies on from a real deployment:
//! sessions must be opened before use, collections must be loaded before
//! search, primary keys are NOT de-duplicated on insert, and hits are ranked
//! with the metric the vector index was built with. Several clients can share
//! one [`MemoryStore`] to model separate processes talking to one server.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::config::{IndexParams, MAX_K};
use crate::error::{Result, SimilarityError};
use crate::types::{
    CollectionSchema, ConsistencyLevel, InsertColumns, Metric, Record, SearchHit,
    SAMPLE_ID_FIELD, VECTOR_FIELD,
};

use super::distance;
use super::{Expr, QueryRow, RemoteClient, SearchRequest};

struct StoredCollection {
    schema: CollectionSchema,
    consistency: ConsistencyLevel,
    index: Option<IndexParams>,
    loaded: bool,
    rows: Vec<Record>,
}

impl StoredCollection {
    fn dimension(&self) -> usize {
        self.schema.vector_dimension().unwrap_or(0)
    }

    fn metric(&self) -> Option<Metric> {
        self.index.as_ref().and_then(|p| metric_from_type(&p.metric_type))
    }
}

fn metric_from_type(metric_type: &str) -> Option<Metric> {
    match metric_type {
        "L2" => Some(Metric::Euclidean),
        "IP" => Some(Metric::DotProduct),
        _ => None,
    }
}

/// Server-side state: collections by name and optional credentials.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, StoredCollection>,
    credentials: Option<(String, String)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects sessions with other credentials.
    pub fn with_credentials(user: &str, password: &str) -> Self {
        Self {
            collections: DashMap::new(),
            credentials: Some((user.to_string(), password.to_string())),
        }
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.iter().map(|c| c.key().clone()).collect()
    }

    /// Stored row count for `name`, duplicates included.
    pub fn row_count(&self, name: &str) -> Option<usize> {
        self.collections.get(name).map(|c| c.rows.len())
    }

    pub fn consistency_level(&self, name: &str) -> Option<ConsistencyLevel> {
        self.collections.get(name).map(|c| c.consistency)
    }

    pub fn index_params(&self, name: &str) -> Option<IndexParams> {
        self.collections.get(name).and_then(|c| c.index.clone())
    }
}

#[derive(Debug, Clone)]
struct Session {
    uri: String,
}

/// Client bound to a [`MemoryStore`], with its own session registry.
pub struct MemoryClient {
    store: Arc<MemoryStore>,
    sessions: DashMap<String, Session>,
    reachable: bool,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            sessions: DashMap::new(),
            reachable: true,
        }
    }

    /// A client whose server never answers; every `connect` fails.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, alias: &str) -> bool {
        self.sessions.contains_key(alias)
    }

    fn session(&self, alias: &str) -> Result<()> {
        if self.sessions.contains_key(alias) {
            Ok(())
        } else {
            Err(SimilarityError::Remote(format!(
                "should create connection first: {alias}"
            )))
        }
    }

    fn missing(name: &str) -> SimilarityError {
        SimilarityError::Remote(format!("collection not found: {name}"))
    }
}

#[async_trait]
impl RemoteClient for MemoryClient {
    async fn connect(&self, alias: &str, uri: &str, user: &str, password: &str) -> Result<()> {
        if !self.reachable {
            return Err(SimilarityError::Remote(format!(
                "failed to connect to {uri}: server unavailable"
            )));
        }
        if let Some((u, p)) = &self.store.credentials {
            if u != user || p != password {
                return Err(SimilarityError::Remote(
                    "authentication failed".to_string(),
                ));
            }
        }
        self.sessions.insert(
            alias.to_string(),
            Session {
                uri: uri.to_string(),
            },
        );
        debug!(alias, uri, "memory session opened");
        Ok(())
    }

    async fn disconnect(&self, alias: &str) -> Result<()> {
        if let Some((_, session)) = self.sessions.remove(alias) {
            debug!(alias, uri = %session.uri, "memory session closed");
        }
        Ok(())
    }

    async fn has_collection(&self, alias: &str, name: &str) -> Result<bool> {
        self.session(alias)?;
        Ok(self.store.collections.contains_key(name))
    }

    async fn create_collection(
        &self,
        alias: &str,
        name: &str,
        schema: &CollectionSchema,
        consistency: ConsistencyLevel,
    ) -> Result<()> {
        self.session(alias)?;
        if schema.primary_field().is_none() {
            return Err(SimilarityError::Remote(
                "schema must have a primary field".to_string(),
            ));
        }
        match self.store.collections.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SimilarityError::Remote(format!(
                "collection already exists: {name}"
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(StoredCollection {
                    schema: schema.clone(),
                    consistency,
                    index: None,
                    loaded: false,
                    rows: Vec::new(),
                });
                Ok(())
            }
        }
    }

    async fn describe_collection(&self, alias: &str, name: &str) -> Result<CollectionSchema> {
        self.session(alias)?;
        self.store
            .collections
            .get(name)
            .map(|c| c.schema.clone())
            .ok_or_else(|| Self::missing(name))
    }

    async fn create_index(
        &self,
        alias: &str,
        name: &str,
        field: &str,
        params: &IndexParams,
    ) -> Result<()> {
        self.session(alias)?;
        let mut col = self
            .store
            .collections
            .get_mut(name)
            .ok_or_else(|| Self::missing(name))?;
        if !col.schema.fields.iter().any(|f| f.name == field && f.dim.is_some()) {
            return Err(SimilarityError::Remote(format!(
                "field {field} is not a vector field"
            )));
        }
        if metric_from_type(&params.metric_type).is_none() {
            return Err(SimilarityError::Remote(format!(
                "unsupported metric type {}",
                params.metric_type
            )));
        }
        col.index = Some(params.clone());
        Ok(())
    }

    async fn load_collection(&self, alias: &str, name: &str) -> Result<()> {
        self.session(alias)?;
        let mut col = self
            .store
            .collections
            .get_mut(name)
            .ok_or_else(|| Self::missing(name))?;
        if col.index.is_none() {
            return Err(SimilarityError::Remote(format!(
                "index not found for collection {name}"
            )));
        }
        col.loaded = true;
        Ok(())
    }

    async fn drop_collection(&self, alias: &str, name: &str) -> Result<()> {
        self.session(alias)?;
        self.store
            .collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Self::missing(name))
    }

    async fn insert(&self, alias: &str, name: &str, columns: InsertColumns) -> Result<usize> {
        self.session(alias)?;
        let mut col = self
            .store
            .collections
            .get_mut(name)
            .ok_or_else(|| Self::missing(name))?;

        if columns.vectors.len() != columns.pks.len()
            || columns.sample_ids.len() != columns.pks.len()
        {
            return Err(SimilarityError::Remote(
                "insert columns have different lengths".to_string(),
            ));
        }
        let dim = col.dimension();
        if let Some(bad) = columns.vectors.iter().find(|v| v.len() != dim) {
            return Err(SimilarityError::Remote(format!(
                "vector dimension {} does not match collection dimension {dim}",
                bad.len()
            )));
        }

        let count = columns.len();
        col.rows.extend(columns.into_records());
        Ok(count)
    }

    async fn delete(&self, alias: &str, name: &str, expr: &Expr) -> Result<()> {
        self.session(alias)?;
        let mut col = self
            .store
            .collections
            .get_mut(name)
            .ok_or_else(|| Self::missing(name))?;
        col.rows.retain(|r| !expr.matches(r));
        Ok(())
    }

    async fn query(
        &self,
        alias: &str,
        name: &str,
        expr: &Expr,
        output_fields: &[&str],
    ) -> Result<Vec<QueryRow>> {
        self.session(alias)?;
        let col = self
            .store
            .collections
            .get(name)
            .ok_or_else(|| Self::missing(name))?;
        if !col.loaded {
            return Err(SimilarityError::Remote(format!(
                "collection not loaded: {name}"
            )));
        }

        let want_vector = output_fields.contains(&VECTOR_FIELD);
        let want_sample = output_fields.contains(&SAMPLE_ID_FIELD);

        Ok(col
            .rows
            .iter()
            .filter(|r| expr.matches(r))
            .map(|r| QueryRow {
                pk: r.pk.clone(),
                vector: want_vector.then(|| r.vector.clone()),
                sample_id: want_sample.then(|| r.sample_id.clone()),
            })
            .collect())
    }

    async fn search(
        &self,
        alias: &str,
        name: &str,
        request: SearchRequest<'_>,
    ) -> Result<Vec<SearchHit>> {
        self.session(alias)?;
        let col = self
            .store
            .collections
            .get(name)
            .ok_or_else(|| Self::missing(name))?;
        if !col.loaded {
            return Err(SimilarityError::Remote(format!(
                "collection not loaded: {name}"
            )));
        }
        if request.limit == 0 || request.limit > MAX_K {
            return Err(SimilarityError::Remote(format!(
                "limit should be in range [1, {MAX_K}], got {}",
                request.limit
            )));
        }
        if request.anns_field != VECTOR_FIELD {
            return Err(SimilarityError::Remote(format!(
                "field {} is not a vector field",
                request.anns_field
            )));
        }
        if request.vector.len() != col.dimension() {
            return Err(SimilarityError::Remote(format!(
                "vector dimension {} does not match collection dimension {}",
                request.vector.len(),
                col.dimension()
            )));
        }
        let metric = col.metric().ok_or_else(|| {
            SimilarityError::Remote(format!("index not found for collection {name}"))
        })?;
        if metric_from_type(&request.param.metric_type) != Some(metric) {
            return Err(SimilarityError::Remote(format!(
                "metric type not match: expected {}, got {}",
                metric.metric_type(),
                request.param.metric_type
            )));
        }

        let mut hits: Vec<SearchHit> = col
            .rows
            .iter()
            .filter(|r| request.expr.is_none_or(|e| e.matches(r)))
            .map(|r| SearchHit {
                id: r.pk.clone(),
                score: distance::score(request.vector, &r.vector, metric),
            })
            .collect();

        hits.sort_by(|a, b| {
            let ord = a
                .score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal);
            if metric.higher_is_closer() {
                ord.reverse()
            } else {
                ord
            }
        });
        hits.truncate(request.limit);
        Ok(hits)
    }

    async fn flush(&self, alias: &str, name: &str) -> Result<()> {
        self.session(alias)?;
        if self.store.collections.contains_key(name) {
            Ok(())
        } else {
            Err(Self::missing(name))
        }
    }

    async fn num_entities(&self, alias: &str, name: &str) -> Result<u64> {
        self.session(alias)?;
        self.store
            .collections
            .get(name)
            .map(|c| c.rows.len() as u64)
            .ok_or_else(|| Self::missing(name))
    }
}
