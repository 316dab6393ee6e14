use hookcast_core::error::CoreError;

/// Error type returned by every [`SubscriptionStore`](crate::SubscriptionStore)
/// operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Validation or not-found raised by the store itself.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The underlying database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted event list could not be encoded or decoded.
    #[error("Corrupt event list: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(id: &str) -> Self {
        StoreError::Core(CoreError::NotFound {
            entity: "Webhook",
            id: id.to_string(),
        })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Core(CoreError::NotFound { .. }))
    }
}
