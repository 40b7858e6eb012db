//! Remote vector-database contract and its bindings.
//!
//! The index never talks to a global session registry: every call carries the
//! alias of the session it runs under, and the binding resolves it.

pub mod distance;
pub mod expr;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{IndexParams, SearchParam};
use crate::error::Result;
use crate::types::{CollectionSchema, ConsistencyLevel, InsertColumns, SearchHit};

pub use expr::Expr;
pub use http::HttpClient;
pub use memory::{MemoryClient, MemoryStore};

/// A row returned by a filtered query. Fields not requested are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRow {
    pub pk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_id: Option<String>,
}

/// A single-vector ANN search.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub vector: &'a [f32],
    pub anns_field: &'a str,
    pub param: &'a SearchParam,
    pub expr: Option<&'a Expr>,
    pub limit: usize,
}

/// Operations the index needs from a vector-database service.
///
/// Object-safe so the concrete binding is chosen at startup and injected as
/// `Arc<dyn RemoteClient>`.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Open a session registered under `alias`.
    async fn connect(&self, alias: &str, uri: &str, user: &str, password: &str) -> Result<()>;

    /// Release the session registered under `alias`.
    async fn disconnect(&self, alias: &str) -> Result<()>;

    async fn has_collection(&self, alias: &str, name: &str) -> Result<bool>;

    async fn create_collection(
        &self,
        alias: &str,
        name: &str,
        schema: &CollectionSchema,
        consistency: ConsistencyLevel,
    ) -> Result<()>;

    async fn describe_collection(&self, alias: &str, name: &str) -> Result<CollectionSchema>;

    async fn create_index(
        &self,
        alias: &str,
        name: &str,
        field: &str,
        params: &IndexParams,
    ) -> Result<()>;

    /// Make a collection queryable.
    async fn load_collection(&self, alias: &str, name: &str) -> Result<()>;

    async fn drop_collection(&self, alias: &str, name: &str) -> Result<()>;

    /// Insert a columnar batch, returning the number of rows written.
    async fn insert(&self, alias: &str, name: &str, columns: InsertColumns) -> Result<usize>;

    async fn delete(&self, alias: &str, name: &str, expr: &Expr) -> Result<()>;

    async fn query(
        &self,
        alias: &str,
        name: &str,
        expr: &Expr,
        output_fields: &[&str],
    ) -> Result<Vec<QueryRow>>;

    /// Ranked hits, closest first.
    async fn search(
        &self,
        alias: &str,
        name: &str,
        request: SearchRequest<'_>,
    ) -> Result<Vec<SearchHit>>;

    async fn flush(&self, alias: &str, name: &str) -> Result<()>;

    async fn num_entities(&self, alias: &str, name: &str) -> Result<u64>;
}
