use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::client::distance::mean;
use crate::client::{Expr, SearchRequest};
use crate::error::{Result, SimilarityError};
use crate::types::{Neighbors, NeighborsQuery, SearchHit, VECTOR_FIELD};

use super::SimilarityIndex;

/// A k-nearest-neighbor request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborsRequest {
    pub query: Option<NeighborsQuery>,
    pub k: Option<usize>,
    /// Farthest-neighbor search; always rejected.
    pub reverse: bool,
    /// `None` or `"mean"`.
    pub aggregation: Option<String>,
    pub return_dists: bool,
}

impl NeighborsRequest {
    pub fn new(query: impl Into<NeighborsQuery>, k: usize) -> Self {
        Self {
            query: Some(query.into()),
            k: Some(k),
            ..Default::default()
        }
    }

    pub fn with_aggregation(mut self, aggregation: &str) -> Self {
        self.aggregation = Some(aggregation.to_string());
        self
    }

    pub fn with_dists(mut self) -> Self {
        self.return_dists = true;
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregation {
    Mean,
}

impl SimilarityIndex {
    /// Nearest neighbors of `request.query` among the host's live IDs.
    ///
    /// A single vector or ID yields [`Neighbors::Single`]; a batch of vectors
    /// or IDs yields [`Neighbors::Batch`], unless `mean` aggregation collapses
    /// it into one query vector first.
    #[instrument(skip_all, fields(collection = self.config.collection_name(), k = request.k))]
    pub async fn kneighbors(&self, request: NeighborsRequest) -> Result<Neighbors> {
        let result = self.kneighbors_inner(request).await;
        if let Err(e) = &result {
            crate::metrics::record_error("kneighbors", e);
        }
        result
    }

    async fn kneighbors_inner(&self, request: NeighborsRequest) -> Result<Neighbors> {
        let Some(query) = request.query else {
            return Err(SimilarityError::InvalidArgument(
                "Milvus does not support full index neighbors".to_string(),
            ));
        };
        if request.reverse {
            return Err(SimilarityError::InvalidArgument(
                "Milvus does not support least similarity queries".to_string(),
            ));
        }
        let max_k = self.config.max_k();
        let k = match request.k {
            Some(k) if (1..=max_k).contains(&k) => k,
            _ => {
                return Err(SimilarityError::InvalidArgument(format!(
                    "Milvus requires 0<k<={max_k}"
                )))
            }
        };
        let aggregation = match request.aggregation.as_deref() {
            None => None,
            Some("mean") => Some(Aggregation::Mean),
            Some(other) => {
                return Err(SimilarityError::InvalidArgument(format!(
                    "Unsupported aggregation '{other}'"
                )))
            }
        };

        let (mut vectors, mut single) = self.parse_neighbors_query(query).await?;
        if aggregation == Some(Aggregation::Mean) && !single {
            vectors = vec![mean(&vectors)];
            single = true;
        }

        let col = self.collection();
        let hits: Vec<Vec<SearchHit>> = if col.exists().await? {
            let dim = col.dimension().await?;
            if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
                return Err(SimilarityError::DimensionMismatch {
                    expected: dim,
                    actual: bad.len(),
                });
            }

            let scope = Expr::pk_in(self.index_ids());
            let param = self.config.active_search_param();
            let collection = self.config.collection_name();

            let mut hits = Vec::with_capacity(vectors.len());
            for vector in &vectors {
                let timer = crate::metrics::SEARCH_DURATION
                    .with_label_values(&[collection])
                    .start_timer();
                let response = col
                    .search(SearchRequest {
                        vector: vector.as_slice(),
                        anns_field: VECTOR_FIELD,
                        param,
                        expr: Some(&scope),
                        limit: k,
                    })
                    .await?;
                timer.observe_duration();
                crate::metrics::SEARCHES_TOTAL
                    .with_label_values(&[collection])
                    .inc();
                hits.push(response);
            }
            hits
        } else {
            debug!("collection does not exist; no neighbors");
            vec![Vec::new(); vectors.len()]
        };

        let (ids, dists): (Vec<Vec<String>>, Vec<Vec<f32>>) = hits
            .into_iter()
            .map(|hits| -> (Vec<String>, Vec<f32>) {
                hits.into_iter().map(|h| (h.id, h.score)).unzip()
            })
            .unzip();
        let dists = request.return_dists.then_some(dists);

        if single {
            Ok(Neighbors::Single {
                ids: ids.into_iter().next().unwrap_or_default(),
                dists: dists.map(|d| d.into_iter().next().unwrap_or_default()),
            })
        } else {
            Ok(Neighbors::Batch { ids, dists })
        }
    }

    /// Resolve the query into vectors, and whether it was a single query.
    async fn parse_neighbors_query(&self, query: NeighborsQuery) -> Result<(Vec<Vec<f32>>, bool)> {
        match query {
            NeighborsQuery::Vector(v) => Ok((vec![v], true)),
            NeighborsQuery::Vectors(vs) => {
                if vs.is_empty() {
                    return Err(SimilarityError::InvalidArgument(
                        "query must contain at least one vector".to_string(),
                    ));
                }
                let dim = vs[0].len();
                if let Some(bad) = vs.iter().find(|v| v.len() != dim) {
                    return Err(SimilarityError::DimensionMismatch {
                        expected: dim,
                        actual: bad.len(),
                    });
                }
                Ok((vs, false))
            }
            NeighborsQuery::Id(id) => {
                let vectors = self.query_vectors(std::slice::from_ref(&id)).await?;
                Ok((vectors, true))
            }
            NeighborsQuery::Ids(ids) => {
                if ids.is_empty() {
                    return Err(SimilarityError::InvalidArgument(
                        "query must contain at least one ID".to_string(),
                    ));
                }
                let vectors = self.query_vectors(&ids).await?;
                Ok((vectors, false))
            }
        }
    }

    /// Stored vectors of `ids`, in the order given.
    async fn query_vectors(&self, ids: &[String]) -> Result<Vec<Vec<f32>>> {
        let rows = if self.collection().exists().await? {
            self.fetch_records(ids).await?
        } else {
            Vec::new()
        };

        let by_pk: HashMap<String, Vec<f32>> = rows
            .into_iter()
            .filter_map(|r| r.vector.map(|v| (r.pk, v)))
            .collect();

        let missing = super::ingest::missing_ids(ids, |id| by_pk.contains_key(id));
        if let Some(example) = missing.first() {
            return Err(SimilarityError::NotFound {
                count: missing.len(),
                example: example.clone(),
            });
        }

        Ok(ids
            .iter()
            .map(|id| by_pk.get(id).cloned().unwrap_or_default())
            .collect())
    }
}
