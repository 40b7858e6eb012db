use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, SimilarityError};

/// Primary key field of a remote collection.
pub const PK_FIELD: &str = "pk";
/// Float vector field of a remote collection.
pub const VECTOR_FIELD: &str = "vector";
/// Owning sample ID field of a remote collection.
pub const SAMPLE_ID_FIELD: &str = "sample_id";
/// Max length of the VarChar fields.
pub const MAX_VARCHAR_LENGTH: usize = 64_000;

/// Distance metric for an index. Only these two are supported remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    DotProduct,
    Euclidean,
}

impl Metric {
    pub const SUPPORTED: [&'static str; 2] = ["dotproduct", "euclidean"];

    /// The metric name understood by the remote service.
    pub fn metric_type(&self) -> &'static str {
        match self {
            Metric::DotProduct => "IP",
            Metric::Euclidean => "L2",
        }
    }

    /// Whether a larger score means a closer match.
    pub fn higher_is_closer(&self) -> bool {
        matches!(self, Metric::DotProduct)
    }
}

impl FromStr for Metric {
    type Err = SimilarityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dotproduct" => Ok(Metric::DotProduct),
            "euclidean" => Ok(Metric::Euclidean),
            other => Err(SimilarityError::InvalidArgument(format!(
                "Unsupported metric '{other}'. Supported values are {:?}",
                Metric::SUPPORTED
            ))),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::DotProduct => write!(f, "dotproduct"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// Read-after-write visibility guarantee of a remote collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    Strong,
    #[default]
    Session,
    Bounded,
    Eventually,
}

impl FromStr for ConsistencyLevel {
    type Err = SimilarityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strong" => Ok(ConsistencyLevel::Strong),
            "session" => Ok(ConsistencyLevel::Session),
            "bounded" => Ok(ConsistencyLevel::Bounded),
            "eventually" => Ok(ConsistencyLevel::Eventually),
            other => Err(SimilarityError::InvalidArgument(format!(
                "Unsupported consistency level '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConsistencyLevel::Strong => "Strong",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::Bounded => "Bounded",
            ConsistencyLevel::Eventually => "Eventually",
        };
        f.write_str(name)
    }
}

/// Index structure built over the vector field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    #[default]
    #[serde(rename = "HNSW")]
    Hnsw,
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexKind::Hnsw => write!(f, "HNSW"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    VarChar,
    FloatVector,
}

/// A single field of a remote collection schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub auto_id: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<usize>,
}

impl FieldSchema {
    pub fn varchar(name: &str, max_length: usize) -> Self {
        Self {
            name: name.to_string(),
            data_type: DataType::VarChar,
            is_primary: false,
            auto_id: false,
            max_length: Some(max_length),
            dim: None,
        }
    }

    pub fn primary_varchar(name: &str, max_length: usize) -> Self {
        Self {
            is_primary: true,
            ..Self::varchar(name, max_length)
        }
    }

    pub fn float_vector(name: &str, dim: usize) -> Self {
        Self {
            name: name.to_string(),
            data_type: DataType::FloatVector,
            is_primary: false,
            auto_id: false,
            max_length: None,
            dim: Some(dim),
        }
    }
}

/// Schema of a remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    /// The pk / vector / sample_id layout every index collection uses.
    pub fn for_embeddings(dimension: usize) -> Self {
        Self {
            fields: vec![
                FieldSchema::primary_varchar(PK_FIELD, MAX_VARCHAR_LENGTH),
                FieldSchema::float_vector(VECTOR_FIELD, dimension),
                FieldSchema::varchar(SAMPLE_ID_FIELD, MAX_VARCHAR_LENGTH),
            ],
        }
    }

    /// Declared dimension of the first field that carries one.
    pub fn vector_dimension(&self) -> Option<usize> {
        self.fields.iter().find_map(|f| f.dim)
    }

    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }
}

/// A full row as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub pk: String,
    pub vector: Vec<f32>,
    pub sample_id: String,
}

/// Columnar insert payload: three parallel columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertColumns {
    pub pks: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
    pub sample_ids: Vec<String>,
}

impl InsertColumns {
    pub fn len(&self) -> usize {
        self.pks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pks.is_empty()
    }

    /// Re-pivot into rows for row-oriented transports.
    pub fn into_records(self) -> Vec<Record> {
        self.pks
            .into_iter()
            .zip(self.vectors)
            .zip(self.sample_ids)
            .map(|((pk, vector), sample_id)| Record {
                pk,
                vector,
                sample_id,
            })
            .collect()
    }
}

/// One ranked hit from a remote search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
}

/// A k-nearest-neighbor query, resolved once at the query engine boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum NeighborsQuery {
    /// A single literal query vector.
    Vector(Vec<f32>),
    /// A batch of literal query vectors.
    Vectors(Vec<Vec<f32>>),
    /// The stored vector of one indexed ID.
    Id(String),
    /// The stored vectors of several indexed IDs.
    Ids(Vec<String>),
}

impl From<Vec<f32>> for NeighborsQuery {
    fn from(v: Vec<f32>) -> Self {
        NeighborsQuery::Vector(v)
    }
}

impl From<Vec<Vec<f32>>> for NeighborsQuery {
    fn from(v: Vec<Vec<f32>>) -> Self {
        NeighborsQuery::Vectors(v)
    }
}

impl From<&str> for NeighborsQuery {
    fn from(id: &str) -> Self {
        NeighborsQuery::Id(id.to_string())
    }
}

impl From<Vec<String>> for NeighborsQuery {
    fn from(ids: Vec<String>) -> Self {
        NeighborsQuery::Ids(ids)
    }
}

/// Result of a k-nearest-neighbor query.
#[derive(Debug, Clone, PartialEq)]
pub enum Neighbors {
    /// One query vector: flat lists.
    Single {
        ids: Vec<String>,
        dists: Option<Vec<f32>>,
    },
    /// Several query vectors: one list per query.
    Batch {
        ids: Vec<Vec<String>>,
        dists: Option<Vec<Vec<f32>>>,
    },
}

impl Neighbors {
    /// IDs of a single-vector query, or `None` for a batch.
    pub fn single_ids(&self) -> Option<&[String]> {
        match self {
            Neighbors::Single { ids, .. } => Some(ids),
            Neighbors::Batch { .. } => None,
        }
    }

    /// IDs of a batch query, or `None` for a single vector.
    pub fn batch_ids(&self) -> Option<&[Vec<String>]> {
        match self {
            Neighbors::Single { .. } => None,
            Neighbors::Batch { ids, .. } => Some(ids),
        }
    }
}

/// Embeddings fetched from the index, aligned row by row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingsResult {
    pub embeddings: Vec<Vec<f32>>,
    pub sample_ids: Vec<String>,
    /// Present only when the index tracks patches.
    pub label_ids: Option<Vec<String>>,
}

impl EmbeddingsResult {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}
