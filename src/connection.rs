use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::client::RemoteClient;
use crate::error::{Result, SimilarityError};

/// A fresh session alias: 32 lowercase hex chars.
pub fn new_alias() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Open a session under a freshly generated alias.
///
/// The alias belongs to the caller; it is never shared between index
/// instances. Failures are logged before being returned.
#[instrument(skip(client, password))]
pub async fn connect(
    client: &dyn RemoteClient,
    uri: &str,
    user: &str,
    password: &str,
) -> Result<String> {
    let alias = new_alias();
    match client.connect(&alias, uri, user, password).await {
        Ok(()) => {
            crate::metrics::CONNECTIONS_TOTAL
                .with_label_values(&["ok"])
                .inc();
            debug!(alias = %alias, "created new connection");
            Ok(alias)
        }
        Err(e) => {
            crate::metrics::CONNECTIONS_TOTAL
                .with_label_values(&["error"])
                .inc();
            error!(alias = %alias, error = %e, "failed to create new connection");
            Err(SimilarityError::Connection {
                alias,
                message: e.to_string(),
            })
        }
    }
}

/// Release the session registered under `alias`.
pub async fn disconnect(client: &dyn RemoteClient, alias: &str) -> Result<()> {
    client.disconnect(alias).await?;
    debug!(alias, "closed connection");
    Ok(())
}
