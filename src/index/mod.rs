//! The Milvus-backed similarity index.
//!
//! A [`SimilarityIndex`] owns one session alias and nothing else of the remote
//! state: every operation re-resolves the collection by name, so writes made
//! by other instances become visible according to the collection's
//! consistency level rather than a local cache.

pub mod ingest;
pub mod query;
pub mod retrieve;

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::client::RemoteClient;
use crate::collection::{ensure_collection, Collection};
use crate::config::SimilarityConfig;
use crate::connection;
use crate::error::Result;
use crate::host::HostCollection;

pub use ingest::{AddOptions, RemoveOptions};
pub use query::NeighborsRequest;
pub use retrieve::GetOptions;

/// Backend factory: a validated config plus the client binding to use.
#[derive(Clone)]
pub struct MilvusSimilarity {
    config: Arc<SimilarityConfig>,
    client: Arc<dyn RemoteClient>,
}

impl MilvusSimilarity {
    pub fn new(config: SimilarityConfig, client: Arc<dyn RemoteClient>) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Open an index for `samples` under `brain_key`.
    pub async fn initialize(
        &self,
        samples: Arc<dyn HostCollection>,
        brain_key: &str,
    ) -> Result<SimilarityIndex> {
        SimilarityIndex::new(
            samples,
            self.config.clone(),
            brain_key,
            self.client.clone(),
        )
        .await
    }
}

/// A similarity index stored in a remote collection.
pub struct SimilarityIndex {
    alias: String,
    config: Arc<SimilarityConfig>,
    client: Arc<dyn RemoteClient>,
    samples: Arc<dyn HostCollection>,
    brain_key: String,
}

impl SimilarityIndex {
    /// Connect under a fresh alias and attach to the collection if it exists.
    #[instrument(skip(samples, config, client), fields(collection = config.collection_name()))]
    pub async fn new(
        samples: Arc<dyn HostCollection>,
        config: Arc<SimilarityConfig>,
        brain_key: &str,
        client: Arc<dyn RemoteClient>,
    ) -> Result<Self> {
        let alias = connection::connect(
            client.as_ref(),
            config.uri(),
            config.user(),
            config.password(),
        )
        .await?;

        match ensure_collection(client.as_ref(), config.collection_name(), &alias).await? {
            Some((_, dim)) => info!(dim, "using existing collection"),
            None => debug!("collection will be created on first insert"),
        }

        Ok(Self {
            alias,
            config,
            client,
            samples,
            brain_key: brain_key.to_string(),
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    pub fn brain_key(&self) -> &str {
        &self.brain_key
    }

    pub fn current_sample_ids(&self) -> Vec<String> {
        self.samples.current_sample_ids()
    }

    pub fn current_label_ids(&self) -> Option<Vec<String>> {
        self.samples.current_label_ids()
    }

    /// Whether rows are keyed by patch (label) IDs rather than sample IDs.
    pub fn tracks_patches(&self) -> bool {
        self.config.patches_field().is_some()
    }

    /// The live ID set queries are scoped to.
    fn index_ids(&self) -> Vec<String> {
        if self.tracks_patches() {
            self.current_label_ids().unwrap_or_default()
        } else {
            self.current_sample_ids()
        }
    }

    pub(crate) fn collection(&self) -> Collection<'_> {
        Collection::new(
            self.client.as_ref(),
            &self.alias,
            self.config.collection_name(),
        )
    }

    /// Vector dimension of the remote collection, if it exists yet.
    pub async fn dimension(&self) -> Result<Option<usize>> {
        let col = self.collection();
        if !col.exists().await? {
            return Ok(None);
        }
        col.dimension().await.map(Some)
    }

    /// Number of rows stored remotely, after a flush.
    ///
    /// Bindings without a flush endpoint report the server's row-count
    /// statistic, which can lag recent writes.
    pub async fn total_index_size(&self) -> Result<u64> {
        let col = self.collection();
        if !col.exists().await? {
            return Ok(0);
        }
        col.flush().await?;
        col.num_entities().await
    }

    /// Permanently delete the remote collection.
    #[instrument(skip(self), fields(collection = self.config.collection_name()))]
    pub async fn cleanup(&self) -> Result<()> {
        let col = self.collection();
        if !col.exists().await? {
            debug!("nothing to clean up");
            return Ok(());
        }
        col.drop_collection().await?;
        info!("dropped collection");
        Ok(())
    }

    /// Release this instance's session. The remote collection is kept.
    pub async fn close(self) -> Result<()> {
        connection::disconnect(self.client.as_ref(), &self.alias).await
    }
}
