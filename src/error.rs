use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimilarityError {
    // Validation errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Session errors
    #[error("failed to create connection {alias}: {message}")]
    Connection { alias: String, message: String },

    // Collection errors
    #[error("schema error: {0}")]
    Schema(String),

    // ID reconciliation errors
    #[error("found {count} IDs (eg {example}) that already exist in the index")]
    DuplicateId { count: usize, example: String },

    #[error("found {count} IDs (eg {example}) that do not exist in the index")]
    NotFound { count: usize, example: String },

    // Capability errors
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    // Remote service errors
    #[error("remote service error: {0}")]
    Remote(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    // IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SimilarityError {
    fn from(e: toml::de::Error) -> Self {
        SimilarityError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SimilarityError>;

impl SimilarityError {
    /// Stable label used for metrics and structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            SimilarityError::InvalidArgument(_) => "invalid_argument",
            SimilarityError::DimensionMismatch { .. } => "dimension_mismatch",
            SimilarityError::Connection { .. } => "connection",
            SimilarityError::Schema(_) => "schema",
            SimilarityError::DuplicateId { .. } => "duplicate_id",
            SimilarityError::NotFound { .. } => "not_found",
            SimilarityError::UnsupportedQuery(_) => "unsupported_query",
            SimilarityError::Remote(_) | SimilarityError::Http(_) => "remote",
            SimilarityError::Json(_) => "json",
            SimilarityError::Config(_) | SimilarityError::Io(_) => "config",
        }
    }

    /// Validation failures are raised before any remote side effect.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SimilarityError::InvalidArgument(_)
                | SimilarityError::DimensionMismatch { .. }
                | SimilarityError::UnsupportedQuery(_)
        )
    }
}
