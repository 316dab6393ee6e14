//! Durable storage for webhook subscriptions.
//!
//! The rest of the workspace only sees the [`SubscriptionStore`] trait;
//! whether rows live in PostgreSQL or SQLite is decided once, from the
//! database URL, by [`connect_store`].

pub mod error;
pub mod models;
pub mod repositories;

use std::sync::Arc;

pub use error::StoreError;
pub use repositories::{PgSubscriptionStore, SqliteSubscriptionStore, SubscriptionStore};

/// Open a store for `database_url` and initialise its schema.
///
/// `postgres://` and `postgresql://` URLs select PostgreSQL; everything else
/// is handed to SQLite (`sqlite::memory:` gives a private in-memory store).
pub async fn connect_store(database_url: &str) -> Result<Arc<dyn SubscriptionStore>, StoreError> {
    let store: Arc<dyn SubscriptionStore> = if is_postgres_url(database_url) {
        tracing::debug!("Opening PostgreSQL webhook store");
        Arc::new(PgSubscriptionStore::connect(database_url).await?)
    } else if database_url.contains(":memory:") {
        tracing::debug!("Opening in-memory SQLite webhook store");
        Arc::new(SqliteSubscriptionStore::in_memory().await?)
    } else {
        tracing::debug!("Opening SQLite webhook store");
        Arc::new(SqliteSubscriptionStore::connect(database_url).await?)
    };

    store.init_schema().await?;
    tracing::info!("Webhook store schema ready");
    Ok(store)
}

fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_urls_are_detected() {
        assert!(is_postgres_url("postgres://u:p@localhost/db"));
        assert!(is_postgres_url("postgresql://localhost/db"));
        assert!(!is_postgres_url("sqlite:webhooks.db"));
        assert!(!is_postgres_url("sqlite::memory:"));
    }
}
