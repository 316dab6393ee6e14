/// Subscription ids are opaque strings (UUID v4 unless supplied by the caller).
pub type SubscriptionId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
