use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use milvus_similarity::client::HttpClient;
use milvus_similarity::config::Config;
use milvus_similarity::host::LiveIds;
use milvus_similarity::index::MilvusSimilarity;
use milvus_similarity::metrics;

/// Connectivity check: connect with the configured credentials and report
/// what the configured collection holds.
#[tokio::main]
async fn main() {
    // Load .env
    let _ = dotenvy::dotenv();

    // Optional config path as the only argument
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(path.as_deref()).expect("failed to load config");

    // Initialize tracing from LoggingConfig
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .init();
        }
    }

    metrics::init();

    let similarity = match config.similarity_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid similarity config");
            std::process::exit(2);
        }
    };
    tracing::info!(
        uri = similarity.uri(),
        collection = similarity.collection_name(),
        metric = %similarity.metric(),
        "probing milvus"
    );

    let backend = MilvusSimilarity::new(similarity, Arc::new(HttpClient::new()));
    let index = match backend.initialize(Arc::new(LiveIds::new()), "connectivity-check").await {
        Ok(index) => index,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect");
            std::process::exit(1);
        }
    };

    let report = async {
        let dimension = index.dimension().await?;
        let rows = index.total_index_size().await?;
        Ok::<_, milvus_similarity::SimilarityError>((dimension, rows))
    }
    .await;

    let code = match report {
        Ok((Some(dimension), rows)) => {
            tracing::info!(dimension, rows, "collection exists");
            0
        }
        Ok((None, _)) => {
            tracing::info!("collection does not exist yet");
            0
        }
        Err(e) => {
            tracing::error!(error = %e, code = e.code(), "connectivity check failed");
            1
        }
    };

    if let Err(e) = index.close().await {
        tracing::warn!(error = %e, "failed to disconnect");
    }
    std::process::exit(code);
}
