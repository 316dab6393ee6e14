//! Repository layer: the [`SubscriptionStore`] trait and its per-dialect
//! implementations.

pub mod pg_subscription_repo;
pub mod sqlite_subscription_repo;
pub mod subscription_repo;

pub use pg_subscription_repo::PgSubscriptionStore;
pub use sqlite_subscription_repo::SqliteSubscriptionStore;
pub use subscription_repo::SubscriptionStore;
