use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::client::Expr;
use crate::collection::create_collection;
use crate::error::{Result, SimilarityError};
use crate::types::{InsertColumns, PK_FIELD};

use super::SimilarityIndex;

/// IDs per existence query or delete request.
const ID_BATCH_SIZE: usize = 1000;

/// How `add_to_index` treats IDs that already exist remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    /// Replace existing rows; when false they are skipped.
    pub overwrite: bool,
    /// When false, any existing ID fails the whole call.
    pub allow_existing: bool,
    /// Log a warning naming how many existing IDs were hit.
    pub warn_existing: bool,
    /// Rows per insert request.
    pub batch_size: usize,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            allow_existing: true,
            warn_existing: false,
            batch_size: 100,
        }
    }
}

/// How `remove_from_index` treats IDs that are not stored remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOptions {
    pub allow_missing: bool,
    pub warn_missing: bool,
}

impl Default for RemoveOptions {
    fn default() -> Self {
        Self {
            allow_missing: true,
            warn_missing: false,
        }
    }
}

impl SimilarityIndex {
    /// Add embeddings for `sample_ids` (or patches `label_ids`) to the index.
    ///
    /// Creates the remote collection on first use, sized to the embeddings.
    /// Rows are written in `batch_size` chunks; a failure part-way leaves
    /// earlier chunks in place.
    #[instrument(
        skip_all,
        fields(collection = self.config.collection_name(), rows = embeddings.len())
    )]
    pub async fn add_to_index(
        &self,
        embeddings: Vec<Vec<f32>>,
        sample_ids: Vec<String>,
        label_ids: Option<Vec<String>>,
        opts: AddOptions,
    ) -> Result<()> {
        let result = self
            .add_to_index_inner(embeddings, sample_ids, label_ids, opts)
            .await;
        if let Err(e) = &result {
            crate::metrics::record_error("add_to_index", e);
        }
        result
    }

    async fn add_to_index_inner(
        &self,
        mut embeddings: Vec<Vec<f32>>,
        mut sample_ids: Vec<String>,
        mut label_ids: Option<Vec<String>>,
        opts: AddOptions,
    ) -> Result<()> {
        if opts.batch_size == 0 {
            return Err(SimilarityError::InvalidArgument(
                "batch_size must be positive".to_string(),
            ));
        }
        if sample_ids.len() != embeddings.len() {
            return Err(SimilarityError::InvalidArgument(format!(
                "got {} embeddings but {} sample IDs",
                embeddings.len(),
                sample_ids.len()
            )));
        }
        if let Some(labels) = &label_ids {
            if labels.len() != embeddings.len() {
                return Err(SimilarityError::InvalidArgument(format!(
                    "got {} embeddings but {} label IDs",
                    embeddings.len(),
                    labels.len()
                )));
            }
        }

        let Some(first) = embeddings.first() else {
            debug!("no embeddings to add");
            return Ok(());
        };
        let dim = first.len();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
            return Err(SimilarityError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }

        let col = self.collection();
        if col.exists().await? {
            let expected = col.dimension().await?;
            if expected != dim {
                return Err(SimilarityError::DimensionMismatch {
                    expected,
                    actual: dim,
                });
            }
        } else {
            create_collection(self.client.as_ref(), &self.config, &self.alias, dim).await?;
        }

        let checked = opts.warn_existing || !opts.allow_existing || !opts.overwrite;
        let existing = {
            let ids = label_ids.as_ref().unwrap_or(&sample_ids);
            let existing = if checked {
                self.existing_ids(ids).await?
            } else {
                HashSet::new()
            };

            if !existing.is_empty() {
                if !opts.allow_existing {
                    let example = ids
                        .iter()
                        .find(|id| existing.contains(*id))
                        .cloned()
                        .unwrap_or_default();
                    return Err(SimilarityError::DuplicateId {
                        count: existing.len(),
                        example,
                    });
                }

                if opts.warn_existing {
                    if opts.overwrite {
                        warn!(
                            count = existing.len(),
                            "overwriting IDs that already exist in the index"
                        );
                    } else {
                        warn!(
                            count = existing.len(),
                            "skipping IDs that already exist in the index"
                        );
                    }
                }
            }
            existing
        };

        if !existing.is_empty() && !opts.overwrite {
            let keep: Vec<bool> = label_ids
                .as_ref()
                .unwrap_or(&sample_ids)
                .iter()
                .map(|id| !existing.contains(id))
                .collect();
            let skipped = keep.iter().filter(|k| !**k).count();
            retain_rows(&mut embeddings, &keep);
            retain_rows(&mut sample_ids, &keep);
            if let Some(labels) = label_ids.as_mut() {
                retain_rows(labels, &keep);
            }
            crate::metrics::SKIPPED_ROWS_TOTAL
                .with_label_values(&[self.config.collection_name()])
                .inc_by(skipped as u64);
        } else if opts.overwrite {
            // The service does not de-duplicate primary keys on insert, so
            // replacing means deleting first. Unchecked IDs are deleted blindly.
            let to_delete: Vec<String> = if checked {
                existing.into_iter().collect()
            } else {
                label_ids.as_ref().unwrap_or(&sample_ids).clone()
            };
            self.delete_ids(&to_delete).await?;
        }

        let ids = label_ids.unwrap_or_else(|| sample_ids.clone());
        let total = ids.len();
        let mut written = 0;
        for start in (0..total).step_by(opts.batch_size) {
            let end = (start + opts.batch_size).min(total);
            let columns = InsertColumns {
                pks: ids[start..end].to_vec(),
                vectors: embeddings[start..end].to_vec(),
                sample_ids: sample_ids[start..end].to_vec(),
            };
            written += self.collection().insert(columns).await?;
            crate::metrics::INSERTED_ROWS_TOTAL
                .with_label_values(&[self.config.collection_name()])
                .inc_by((end - start) as u64);
        }

        debug!(rows = total, written, "added embeddings");
        Ok(())
    }

    /// Remove rows for `sample_ids` (or patches `label_ids`) from the index.
    #[instrument(skip_all, fields(collection = self.config.collection_name()))]
    pub async fn remove_from_index(
        &self,
        sample_ids: Option<Vec<String>>,
        label_ids: Option<Vec<String>>,
        opts: RemoveOptions,
    ) -> Result<()> {
        let result = self
            .remove_from_index_inner(sample_ids, label_ids, opts)
            .await;
        if let Err(e) = &result {
            crate::metrics::record_error("remove_from_index", e);
        }
        result
    }

    async fn remove_from_index_inner(
        &self,
        sample_ids: Option<Vec<String>>,
        label_ids: Option<Vec<String>>,
        opts: RemoveOptions,
    ) -> Result<()> {
        if label_ids.is_some() && !self.tracks_patches() {
            return Err(SimilarityError::UnsupportedQuery(
                "this index does not support label IDs".to_string(),
            ));
        }
        let ids = label_ids.or(sample_ids).ok_or_else(|| {
            SimilarityError::InvalidArgument("no IDs were given to remove".to_string())
        })?;

        let col_exists = self.collection().exists().await?;

        if !opts.allow_missing || opts.warn_missing {
            let existing = if col_exists {
                self.existing_ids(&ids).await?
            } else {
                HashSet::new()
            };
            let missing = missing_ids(&ids, |id| existing.contains(id));

            if let Some(example) = missing.first() {
                if !opts.allow_missing {
                    return Err(SimilarityError::NotFound {
                        count: missing.len(),
                        example: example.clone(),
                    });
                }
                if opts.warn_missing {
                    warn!(
                        count = missing.len(),
                        "ignoring IDs that are not present in the index"
                    );
                }
            }
        }

        if col_exists {
            self.delete_ids(&ids).await?;
        }
        debug!(count = ids.len(), "removed IDs");
        Ok(())
    }

    /// The subset of `ids` stored remotely, by primary key.
    pub(crate) async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        let mut found = HashSet::new();
        for batch in ids.chunks(ID_BATCH_SIZE) {
            let rows = self
                .collection()
                .query(&Expr::pk_in(batch.iter().cloned()), &[PK_FIELD])
                .await?;
            found.extend(rows.into_iter().map(|r| r.pk));
        }
        Ok(found)
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<()> {
        for batch in ids.chunks(ID_BATCH_SIZE) {
            self.collection()
                .delete(&Expr::pk_in(batch.iter().cloned()))
                .await?;
            crate::metrics::DELETE_REQUESTS_TOTAL
                .with_label_values(&[self.config.collection_name()])
                .inc();
        }
        Ok(())
    }
}

/// Requested IDs for which `found` is false, de-duplicated, in request order.
pub(crate) fn missing_ids<F>(requested: &[String], found: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut seen = HashSet::new();
    requested
        .iter()
        .filter(|id| !found(id.as_str()) && seen.insert(id.as_str()))
        .cloned()
        .collect()
}

fn retain_rows<T>(rows: &mut Vec<T>, keep: &[bool]) {
    let mut flags = keep.iter();
    rows.retain(|_| flags.next().copied().unwrap_or(false));
}
