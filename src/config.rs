//! Configuration for the Milvus similarity backend.
//!
//! [`SimilarityParams`] is the caller-facing surface (what a config file or a
//! host application provides). [`SimilarityConfig`] is the validated,
//! immutable form the index works with; its index and search parameter
//! blocks are derived once from the metric at construction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, SimilarityError};
use crate::types::{ConsistencyLevel, IndexKind, Metric};

pub const DEFAULT_COLLECTION_NAME: &str = "ClientCollection";
pub const DEFAULT_URI: &str = "http://localhost:19530";
pub const DEFAULT_METRIC: &str = "euclidean";

/// Largest `k` the remote service accepts for a search.
pub const MAX_K: usize = 16_384;

/// Env var pointing at a TOML config file.
pub const CONFIG_PATH_ENV: &str = "MILVUS_SIMILARITY_CONFIG";

const HNSW_M: usize = 8;
const HNSW_EF_CONSTRUCTION: usize = 64;
const HNSW_EF: usize = 10;

/// Raw backend parameters, before validation.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityParams {
    pub embeddings_field: Option<String>,
    pub model: Option<String>,
    pub patches_field: Option<String>,
    pub supports_prompts: Option<bool>,
    pub metric: String,
    pub collection_name: String,
    pub uri: String,
    pub user: String,
    pub password: String,
    pub consistency_level: ConsistencyLevel,
}

impl Default for SimilarityParams {
    fn default() -> Self {
        Self {
            embeddings_field: None,
            model: None,
            patches_field: None,
            supports_prompts: None,
            metric: DEFAULT_METRIC.to_string(),
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            uri: DEFAULT_URI.to_string(),
            user: String::new(),
            password: String::new(),
            consistency_level: ConsistencyLevel::default(),
        }
    }
}

impl std::fmt::Debug for SimilarityParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityParams")
            .field("embeddings_field", &self.embeddings_field)
            .field("model", &self.model)
            .field("patches_field", &self.patches_field)
            .field("supports_prompts", &self.supports_prompts)
            .field("metric", &self.metric)
            .field("collection_name", &self.collection_name)
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("consistency_level", &self.consistency_level)
            .finish()
    }
}

impl SimilarityParams {
    /// Fill connection credentials from `MILVUS_URI`, `MILVUS_USER` and
    /// `MILVUS_PASSWORD`. Values that differ from the defaults win.
    pub fn load_credentials(self) -> Self {
        self.load_credentials_from(|key| std::env::var(key).ok())
    }

    pub fn load_credentials_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.uri == DEFAULT_URI {
            if let Some(uri) = lookup("MILVUS_URI") {
                self.uri = uri;
            }
        }
        if self.user.is_empty() {
            if let Some(user) = lookup("MILVUS_USER") {
                self.user = user;
            }
        }
        if self.password.is_empty() {
            if let Some(password) = lookup("MILVUS_PASSWORD") {
                self.password = password;
            }
        }
        self
    }
}

/// HNSW build-time parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswBuildParams {
    #[serde(rename = "M")]
    pub m: usize,
    #[serde(rename = "efConstruction")]
    pub ef_construction: usize,
}

/// HNSW search-time parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswSearchParams {
    pub ef: usize,
}

/// Parameters used to build the vector index of a new collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    pub metric_type: String,
    pub index_type: IndexKind,
    pub params: HnswBuildParams,
}

/// Search-time parameters for one index kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParam {
    pub metric_type: String,
    pub params: HnswSearchParams,
}

/// Search-time parameters keyed by index kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchParams(HashMap<IndexKind, SearchParam>);

impl SearchParams {
    pub fn for_kind(&self, kind: IndexKind) -> Option<&SearchParam> {
        self.0.get(&kind)
    }
}

/// Validated, immutable backend configuration.
#[derive(Clone)]
pub struct SimilarityConfig {
    embeddings_field: Option<String>,
    model: Option<String>,
    patches_field: Option<String>,
    supports_prompts: Option<bool>,
    metric: Metric,
    collection_name: String,
    uri: String,
    user: String,
    password: String,
    consistency_level: ConsistencyLevel,
    index_params: IndexParams,
    search_params: SearchParams,
}

impl SimilarityConfig {
    /// Validate `params` and derive the index and search parameter blocks.
    pub fn new(params: SimilarityParams) -> Result<Self> {
        let metric: Metric = params.metric.parse()?;

        if let Err(e) = url::Url::parse(&params.uri) {
            return Err(SimilarityError::InvalidArgument(format!(
                "invalid uri '{}': {e}",
                params.uri
            )));
        }

        if params.collection_name.is_empty() {
            return Err(SimilarityError::InvalidArgument(
                "collection name must not be empty".to_string(),
            ));
        }

        let index_params = IndexParams {
            metric_type: metric.metric_type().to_string(),
            index_type: IndexKind::Hnsw,
            params: HnswBuildParams {
                m: HNSW_M,
                ef_construction: HNSW_EF_CONSTRUCTION,
            },
        };

        let mut by_kind = HashMap::new();
        by_kind.insert(
            IndexKind::Hnsw,
            SearchParam {
                metric_type: metric.metric_type().to_string(),
                params: HnswSearchParams { ef: HNSW_EF },
            },
        );

        Ok(Self {
            embeddings_field: params.embeddings_field,
            model: params.model,
            patches_field: params.patches_field,
            supports_prompts: params.supports_prompts,
            metric,
            collection_name: params.collection_name,
            uri: params.uri,
            user: params.user,
            password: params.password,
            consistency_level: params.consistency_level,
            index_params,
            search_params: SearchParams(by_kind),
        })
    }

    /// Reverse of [`SimilarityConfig::new`], for persisting a run.
    pub fn to_params(&self) -> SimilarityParams {
        SimilarityParams {
            embeddings_field: self.embeddings_field.clone(),
            model: self.model.clone(),
            patches_field: self.patches_field.clone(),
            supports_prompts: self.supports_prompts,
            metric: self.metric.to_string(),
            collection_name: self.collection_name.clone(),
            uri: self.uri.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            consistency_level: self.consistency_level,
        }
    }

    pub fn method(&self) -> &'static str {
        "milvus"
    }

    pub fn embeddings_field(&self) -> Option<&str> {
        self.embeddings_field.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn patches_field(&self) -> Option<&str> {
        self.patches_field.as_deref()
    }

    pub fn supports_prompts(&self) -> Option<bool> {
        self.supports_prompts
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn consistency_level(&self) -> ConsistencyLevel {
        self.consistency_level
    }

    pub fn index_params(&self) -> &IndexParams {
        &self.index_params
    }

    pub fn search_params(&self) -> &SearchParams {
        &self.search_params
    }

    /// Search parameters for the index kind this config builds.
    pub fn active_search_param(&self) -> &SearchParam {
        // Both blocks are derived together in `new`, so the kind is always present.
        &self.search_params.0[&self.index_params.index_type]
    }

    pub fn max_k(&self) -> usize {
        MAX_K
    }

    pub fn supports_least_similarity(&self) -> bool {
        false
    }

    pub fn supported_aggregations(&self) -> &'static [&'static str] {
        &["mean"]
    }

    /// Listing every vector without an ID scope is not available remotely.
    pub fn supports_full_index(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for SimilarityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityConfig")
            .field("patches_field", &self.patches_field)
            .field("metric", &self.metric)
            .field("collection_name", &self.collection_name)
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("consistency_level", &self.consistency_level)
            .field("index_params", &self.index_params)
            .finish_non_exhaustive()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

/// Logging setup for the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Top-level file configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub similarity: SimilarityParams,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load defaults, then the TOML file (explicit `path` or
    /// `MILVUS_SIMILARITY_CONFIG`), then env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path: Option<PathBuf> = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(&p).map_err(|e| {
                    SimilarityError::Config(format!("failed to read {}: {e}", p.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `MILVUS_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let s = &mut self.similarity;
        if let Some(v) = lookup("MILVUS_URI") {
            s.uri = v;
        }
        if let Some(v) = lookup("MILVUS_USER") {
            s.user = v;
        }
        if let Some(v) = lookup("MILVUS_PASSWORD") {
            s.password = v;
        }
        if let Some(v) = lookup("MILVUS_COLLECTION") {
            s.collection_name = v;
        }
        if let Some(v) = lookup("MILVUS_METRIC") {
            s.metric = v;
        }
        if let Some(v) = lookup("MILVUS_CONSISTENCY_LEVEL") {
            s.consistency_level = v
                .parse()
                .map_err(|e: SimilarityError| SimilarityError::Config(e.to_string()))?;
        }
        if let Some(v) = lookup("MILVUS_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("MILVUS_LOG_FORMAT") {
            self.logging.format = v;
        }
        Ok(())
    }

    /// Validate the similarity section.
    pub fn similarity_config(&self) -> Result<SimilarityConfig> {
        SimilarityConfig::new(self.similarity.clone())
    }
}
