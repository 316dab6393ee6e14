//! The [`SubscriptionStore`] contract and the dialect-independent pieces
//! shared by its implementations.

use async_trait::async_trait;
use hookcast_core::types::{SubscriptionId, Timestamp};

use crate::error::StoreError;
use crate::models::subscription::{CreateSubscription, Subscription, SubscriptionRow};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

pub(crate) const SUBSCRIPTION_COLUMNS: &str =
    "id, url, secret, events, enabled, description, created_at, updated_at";

pub(crate) const INDEX_STATEMENTS: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_webhooks_enabled ON webhooks(enabled)",
    "CREATE INDEX IF NOT EXISTS idx_webhooks_created_at ON webhooks(created_at)",
];

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// CRUD and query operations for webhook subscriptions.
///
/// This is the only component that touches persistent storage. Writes are
/// single statements or run inside one transaction, so concurrent readers
/// observe either the old or the new record, never a mix.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Create the `webhooks` table and its indexes if missing. Idempotent.
    async fn init_schema(&self) -> Result<(), StoreError>;

    /// Validate and insert a subscription, returning its id.
    ///
    /// The id is generated when `input.id` is `None`; timestamps are always
    /// assigned here.
    async fn create(&self, input: CreateSubscription) -> Result<SubscriptionId, StoreError>;

    /// Replace every mutable field of subscription `id`.
    ///
    /// `id` and `created_at` are kept, `updated_at` is refreshed.
    async fn update(&self, id: &str, input: CreateSubscription) -> Result<(), StoreError>;

    /// Delete subscription `id`. Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Fetch one subscription.
    async fn get(&self, id: &str) -> Result<Subscription, StoreError>;

    /// All subscriptions, newest first.
    async fn list_all(&self) -> Result<Vec<Subscription>, StoreError>;

    /// Enabled subscriptions whose event set contains exactly `event_type`.
    async fn list_enabled_by_event(&self, event_type: &str)
        -> Result<Vec<Subscription>, StoreError>;

    /// Cheap connectivity probe.
    async fn health_check(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Validate `input` and turn it into a full record stamped with `now`.
pub(crate) fn new_record(
    input: CreateSubscription,
    now: Timestamp,
) -> Result<Subscription, StoreError> {
    let input = input.validated()?;
    Ok(Subscription {
        id: input
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        url: input.url,
        secret: input.secret,
        events: input.events,
        enabled: input.enabled,
        description: input.description,
        created_at: now,
        updated_at: now,
    })
}

/// `updated_at` for a replace; never earlier than `created_at`.
pub(crate) fn refreshed_at(created_at: Timestamp, now: Timestamp) -> Timestamp {
    now.max(created_at)
}

pub(crate) fn encode_events(events: &[String]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(events)?)
}

pub(crate) fn decode_rows(rows: Vec<SubscriptionRow>) -> Result<Vec<Subscription>, StoreError> {
    rows.into_iter()
        .map(|row| Subscription::try_from(row).map_err(StoreError::from))
        .collect()
}

/// Decode enabled rows and keep those subscribed to `event_type`.
///
/// A row whose event list cannot be decoded is skipped so it cannot block
/// delivery to every other subscriber.
pub(crate) fn decode_matching(rows: Vec<SubscriptionRow>, event_type: &str) -> Vec<Subscription> {
    let subs = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match Subscription::try_from(row) {
                Ok(sub) => Some(sub),
                Err(e) => {
                    tracing::warn!(
                        webhook_id = %id,
                        error = %e,
                        "Skipping webhook with corrupt event list",
                    );
                    None
                }
            }
        })
        .collect();
    retain_subscribed(subs, event_type)
}

/// Keep the subscriptions that list `event_type` exactly.
///
/// The event list is stored as a serialized array, so matching in SQL with
/// `LIKE` would let `"message"` match `"message.ack"`.
pub(crate) fn retain_subscribed(subs: Vec<Subscription>, event_type: &str) -> Vec<Subscription> {
    subs.into_iter()
        .filter(|s| s.enabled && s.subscribes_to(event_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn sub(id: &str, events: &[&str], enabled: bool) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: id.into(),
            url: "https://example.com".into(),
            secret: None,
            events: events.iter().map(|e| e.to_string()).collect(),
            enabled,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn new_record_generates_id_and_timestamps() {
        let now = Utc::now();
        let record = new_record(
            CreateSubscription::new("https://example.com", &["message"]),
            now,
        )
        .unwrap();
        assert_eq!(record.id.len(), 36);
        assert_eq!(record.created_at, now);
        assert_eq!(record.updated_at, now);
    }

    #[test]
    fn new_record_keeps_preset_id() {
        let mut input = CreateSubscription::new("https://example.com", &["message"]);
        input.id = Some("fixed-id".into());
        let record = new_record(input, Utc::now()).unwrap();
        assert_eq!(record.id, "fixed-id");
    }

    #[test]
    fn refreshed_at_never_precedes_created_at() {
        let created = Utc::now();
        let earlier = created - Duration::seconds(5);
        assert_eq!(refreshed_at(created, earlier), created);
        let later = created + Duration::seconds(5);
        assert_eq!(refreshed_at(created, later), later);
    }

    #[test]
    fn retain_subscribed_is_exact_and_enabled_only() {
        let subs = vec![
            sub("a", &["message"], true),
            sub("b", &["message.ack"], true),
            sub("c", &["message.ack", "presence"], true),
            sub("d", &["message.ack"], false),
        ];
        let ids: Vec<String> = retain_subscribed(subs, "message.ack")
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn events_round_trip_through_json() {
        let encoded = encode_events(&["qr".to_string(), "message".to_string()]).unwrap();
        assert_eq!(encoded, r#"["qr","message"]"#);
    }

    #[test]
    fn decode_matching_skips_corrupt_rows() {
        let now = Utc::now();
        let row = |id: &str, events: &str| SubscriptionRow {
            id: id.into(),
            url: "https://example.com".into(),
            secret: None,
            events: events.into(),
            enabled: true,
            description: None,
            created_at: now,
            updated_at: now,
        };
        let rows = vec![
            row("broken", "not json"),
            row("ok", r#"["message"]"#),
            row("other", r#"["presence"]"#),
        ];

        let matched = decode_matching(rows, "message");
        let ids: Vec<&str> = matched.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
    }
}
