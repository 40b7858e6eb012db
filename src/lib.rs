//! Milvus-backed similarity index: batched sync, ID reconciliation and
//! k-nearest-neighbor query translation against a remote vector database.

pub mod client;
pub mod collection;
pub mod config;
pub mod connection;
pub mod error;
pub mod host;
pub mod index;
pub mod metrics;
pub mod types;

pub use config::{Config, SimilarityConfig, SimilarityParams};
pub use error::{Result, SimilarityError};
pub use host::{HostCollection, LiveIds};
pub use index::{
    AddOptions, GetOptions, MilvusSimilarity, NeighborsRequest, RemoveOptions, SimilarityIndex,
};
