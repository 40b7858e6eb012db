use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::client::{Expr, QueryRow, SearchRequest};
use crate::collection::Collection;
use crate::error::{Result, SimilarityError};
use crate::types::{EmbeddingsResult, PK_FIELD, SAMPLE_ID_FIELD, VECTOR_FIELD};

use super::ingest::missing_ids;
use super::SimilarityIndex;

/// IDs per direct primary-key lookup.
const LOOKUP_BATCH_SIZE: usize = 1000;
/// Samples per patch search.
const PATCH_SEARCH_BATCH_SIZE: usize = 100;

/// How `get_embeddings` treats requested IDs that are not stored remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetOptions {
    pub allow_missing: bool,
    pub warn_missing: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            allow_missing: true,
            warn_missing: false,
        }
    }
}

struct Fetched {
    result: EmbeddingsResult,
    missing: Vec<String>,
}

/// Pivot query rows into aligned columns.
fn collect_rows(rows: Vec<QueryRow>, with_labels: bool) -> Result<EmbeddingsResult> {
    let mut result = EmbeddingsResult {
        label_ids: with_labels.then(Vec::new),
        ..Default::default()
    };
    for row in rows {
        let (Some(vector), Some(sample_id)) = (row.vector, row.sample_id) else {
            return Err(SimilarityError::Remote(format!(
                "row {} is missing requested output fields",
                row.pk
            )));
        };
        result.embeddings.push(vector);
        result.sample_ids.push(sample_id);
        if let Some(labels) = result.label_ids.as_mut() {
            labels.push(row.pk);
        }
    }
    Ok(result)
}

impl SimilarityIndex {
    /// Fetch stored embeddings by sample ID or, for patch indexes, by label ID.
    ///
    /// Asking a patch index for sample IDs returns every patch owned by those
    /// samples. Retrieving the whole index without IDs is not supported.
    #[instrument(skip_all, fields(collection = self.config.collection_name()))]
    pub async fn get_embeddings(
        &self,
        sample_ids: Option<Vec<String>>,
        label_ids: Option<Vec<String>>,
        opts: GetOptions,
    ) -> Result<EmbeddingsResult> {
        let result = self.get_embeddings_inner(sample_ids, label_ids, opts).await;
        if let Err(e) = &result {
            crate::metrics::record_error("get_embeddings", e);
        }
        result
    }

    async fn get_embeddings_inner(
        &self,
        sample_ids: Option<Vec<String>>,
        label_ids: Option<Vec<String>>,
        opts: GetOptions,
    ) -> Result<EmbeddingsResult> {
        let mut sample_ids = sample_ids;
        if label_ids.is_some() {
            if !self.tracks_patches() {
                return Err(SimilarityError::UnsupportedQuery(
                    "this index does not support label IDs".to_string(),
                ));
            }
            if sample_ids.take().is_some() {
                warn!("ignoring sample IDs when label IDs are provided");
            }
        }

        let fetched = match (self.tracks_patches(), sample_ids, label_ids) {
            (true, Some(sample_ids), None) => {
                self.patch_embeddings_from_sample_ids(&sample_ids).await?
            }
            (true, None, Some(label_ids)) => {
                self.patch_embeddings_from_label_ids(&label_ids).await?
            }
            (false, Some(sample_ids), _) => self.sample_embeddings(&sample_ids).await?,
            _ => {
                return Err(SimilarityError::UnsupportedQuery(
                    "retrieving all vectors in an index is not supported".to_string(),
                ))
            }
        };

        if let Some(example) = fetched.missing.first() {
            if !opts.allow_missing {
                return Err(SimilarityError::NotFound {
                    count: fetched.missing.len(),
                    example: example.clone(),
                });
            }
            if opts.warn_missing {
                warn!(
                    count = fetched.missing.len(),
                    "skipping IDs that do not exist in the index"
                );
            }
        }

        debug!(found = fetched.result.len(), "fetched embeddings");
        Ok(fetched.result)
    }

    /// Full records for `pks`, in batches of `LOOKUP_BATCH_SIZE`.
    pub(crate) async fn fetch_records(&self, pks: &[String]) -> Result<Vec<QueryRow>> {
        let col = self.collection();
        let mut rows = Vec::with_capacity(pks.len());
        for batch in pks.chunks(LOOKUP_BATCH_SIZE) {
            rows.extend(
                col.query(
                    &Expr::pk_in(batch.iter().cloned()),
                    &[PK_FIELD, SAMPLE_ID_FIELD, VECTOR_FIELD],
                )
                .await?,
            );
        }
        Ok(rows)
    }

    async fn sample_embeddings(&self, sample_ids: &[String]) -> Result<Fetched> {
        let rows = if self.collection().exists().await? {
            self.fetch_records(sample_ids).await?
        } else {
            Vec::new()
        };
        let result = collect_rows(rows, false)?;
        let missing = {
            let found: HashSet<&str> = result.sample_ids.iter().map(String::as_str).collect();
            missing_ids(sample_ids, |id| found.contains(id))
        };
        Ok(Fetched { result, missing })
    }

    async fn patch_embeddings_from_label_ids(&self, label_ids: &[String]) -> Result<Fetched> {
        let rows = if self.collection().exists().await? {
            self.fetch_records(label_ids).await?
        } else {
            Vec::new()
        };
        let result = collect_rows(rows, true)?;
        let missing = {
            let found: HashSet<&str> = result
                .label_ids
                .iter()
                .flatten()
                .map(String::as_str)
                .collect();
            missing_ids(label_ids, |id| found.contains(id))
        };
        Ok(Fetched { result, missing })
    }

    /// Patches of `sample_ids`, discovered with a zero-vector search filtered
    /// by owning sample; the service exposes no listing by foreign key.
    ///
    /// A batch whose search comes back full may have lost patches past the
    /// limit, so its samples are then resolved one at a time.
    async fn patch_embeddings_from_sample_ids(&self, sample_ids: &[String]) -> Result<Fetched> {
        let col = self.collection();
        if !col.exists().await? {
            return Ok(Fetched {
                result: EmbeddingsResult {
                    label_ids: Some(Vec::new()),
                    ..Default::default()
                },
                missing: missing_ids(sample_ids, |_| false),
            });
        }

        let dim = col.dimension().await?;
        let origin = vec![0.0f32; dim];
        let max_k = self.config.max_k();
        let limit = PATCH_SEARCH_BATCH_SIZE.min(max_k);

        let mut rows = Vec::new();
        for batch in sample_ids.chunks(PATCH_SEARCH_BATCH_SIZE) {
            let mut pks = self.search_patches(col, &origin, batch, limit).await?;
            if pks.len() >= limit {
                debug!(samples = batch.len(), limit, "patch search saturated; resolving per sample");
                pks.clear();
                for sample_id in batch {
                    let found = self
                        .search_patches(col, &origin, std::slice::from_ref(sample_id), max_k)
                        .await?;
                    if found.len() >= max_k {
                        warn!(
                            sample_id = %sample_id,
                            max_k,
                            "sample has more patches than one search returns; truncated"
                        );
                    }
                    pks.extend(found);
                }
            }
            if !pks.is_empty() {
                rows.extend(self.fetch_records(&pks).await?);
            }
        }

        let result = collect_rows(rows, true)?;
        let missing = {
            let owners: HashSet<&str> = result.sample_ids.iter().map(String::as_str).collect();
            missing_ids(sample_ids, |id| owners.contains(id))
        };
        Ok(Fetched { result, missing })
    }

    /// Primary keys of up to `limit` patches owned by `sample_ids`.
    async fn search_patches(
        &self,
        col: Collection<'_>,
        origin: &[f32],
        sample_ids: &[String],
        limit: usize,
    ) -> Result<Vec<String>> {
        let scope = Expr::sample_id_in(sample_ids.iter().cloned());
        let hits = col
            .search(SearchRequest {
                vector: origin,
                anns_field: VECTOR_FIELD,
                param: self.config.active_search_param(),
                expr: Some(&scope),
                limit,
            })
            .await?;
        Ok(hits.into_iter().map(|h| h.id).collect())
    }
}
