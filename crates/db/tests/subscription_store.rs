use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use hookcast_core::error::CoreError;
use hookcast_db::models::subscription::CreateSubscription;
use hookcast_db::{connect_store, SqliteSubscriptionStore, StoreError, SubscriptionStore};
use sqlx::sqlite::SqlitePoolOptions;

async fn store() -> SqliteSubscriptionStore {
    let store = SqliteSubscriptionStore::in_memory().await.unwrap();
    store.init_schema().await.unwrap();
    store
}

/// Gives consecutive inserts distinct `created_at` values.
async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn create_then_get() {
    let store = store().await;
    let id = store
        .create(
            CreateSubscription::new("https://example.com/hook", &["message", "presence"])
                .with_secret("s3cret")
                .with_description("primary"),
        )
        .await
        .unwrap();

    let sub = store.get(&id).await.unwrap();
    assert_eq!(sub.id, id);
    assert_eq!(sub.url, "https://example.com/hook");
    assert_eq!(sub.secret.as_deref(), Some("s3cret"));
    assert_eq!(sub.events, vec!["message", "presence"]);
    assert!(sub.enabled);
    assert_eq!(sub.description.as_deref(), Some("primary"));
    assert_eq!(sub.created_at, sub.updated_at);
}

#[tokio::test]
async fn get_unknown_is_not_found() {
    let store = store().await;
    let err = store.get("missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn invalid_input_is_not_persisted() {
    let store = store().await;
    let err = store
        .create(CreateSubscription::new("not a url", &["message"]))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));

    let err = store
        .create(CreateSubscription::new("https://example.com", &["bogus"]))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));

    assert!(store.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_replaces_fields_and_keeps_identity() {
    let store = store().await;
    let id = store
        .create(CreateSubscription::new("https://example.com/a", &["message"]).with_secret("x"))
        .await
        .unwrap();
    let before = store.get(&id).await.unwrap();
    tick().await;

    store
        .update(
            &id,
            CreateSubscription::new("https://example.com/b", &["qr", "presence"]).disabled(),
        )
        .await
        .unwrap();

    let after = store.get(&id).await.unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at > before.updated_at);
    assert_eq!(after.url, "https://example.com/b");
    assert_eq!(after.events, vec!["qr", "presence"]);
    assert!(!after.enabled);
    assert_eq!(after.secret, None);
}

#[tokio::test]
async fn update_unknown_is_not_found() {
    let store = store().await;
    let err = store
        .update("missing", CreateSubscription::new("https://example.com", &["qr"]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn update_validates_before_touching_the_row() {
    let store = store().await;
    let id = store
        .create(CreateSubscription::new("https://example.com", &["qr"]))
        .await
        .unwrap();
    let err = store
        .update(&id, CreateSubscription::new("https://example.com", &[]))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));
    assert_eq!(store.get(&id).await.unwrap().events, vec!["qr"]);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = store().await;
    let id = store
        .create(CreateSubscription::new("https://example.com", &["qr"]))
        .await
        .unwrap();

    store.delete(&id).await.unwrap();
    assert!(store.get(&id).await.unwrap_err().is_not_found());
    store.delete(&id).await.unwrap();
    store.delete("never-existed").await.unwrap();
}

#[tokio::test]
async fn list_all_is_newest_first() {
    let store = store().await;
    let first = store
        .create(CreateSubscription::new("https://example.com/1", &["qr"]))
        .await
        .unwrap();
    tick().await;
    let second = store
        .create(CreateSubscription::new("https://example.com/2", &["qr"]).disabled())
        .await
        .unwrap();
    tick().await;
    let third = store
        .create(CreateSubscription::new("https://example.com/3", &["qr"]))
        .await
        .unwrap();

    let ids: Vec<String> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![third, second, first]);
}

#[tokio::test]
async fn list_enabled_by_event_matches_exactly() {
    let store = store().await;
    let plain = store
        .create(CreateSubscription::new("https://example.com/1", &["message"]))
        .await
        .unwrap();
    let ack = store
        .create(CreateSubscription::new("https://example.com/2", &["message.ack"]))
        .await
        .unwrap();
    store
        .create(CreateSubscription::new("https://example.com/3", &["message"]).disabled())
        .await
        .unwrap();

    let hits = store.list_enabled_by_event("message").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, plain);

    let hits = store.list_enabled_by_event("message.ack").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, ack);

    assert!(store
        .list_enabled_by_event("presence")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn corrupt_row_does_not_block_matching() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteSubscriptionStore::new(pool.clone());
    store.init_schema().await.unwrap();

    let good = store
        .create(CreateSubscription::new("https://example.com/ok", &["message"]))
        .await
        .unwrap();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO webhooks (id, url, secret, events, enabled, description, created_at, updated_at) \
         VALUES ('broken', 'https://example.com/broken', NULL, 'not json', 1, NULL, ?, ?)",
    )
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await
    .unwrap();

    let hits = store.list_enabled_by_event("message").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, good);

    // Listing everything still surfaces the corruption.
    assert_matches!(
        store.list_all().await,
        Err(StoreError::Serialization(_))
    );
}

#[tokio::test]
async fn disabling_removes_from_matches() {
    let store = store().await;
    let id = store
        .create(CreateSubscription::new("https://example.com", &["qr"]))
        .await
        .unwrap();
    assert_eq!(store.list_enabled_by_event("qr").await.unwrap().len(), 1);

    store
        .update(&id, CreateSubscription::new("https://example.com", &["qr"]).disabled())
        .await
        .unwrap();
    assert!(store.list_enabled_by_event("qr").await.unwrap().is_empty());
}

#[tokio::test]
async fn init_schema_is_idempotent() {
    let store = store().await;
    store
        .create(CreateSubscription::new("https://example.com", &["qr"]))
        .await
        .unwrap();
    store.init_schema().await.unwrap();
    assert_eq!(store.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn connect_store_opens_memory_sqlite() {
    let store = connect_store("sqlite::memory:").await.unwrap();
    store.health_check().await.unwrap();
    let id = store
        .create(CreateSubscription::new("http://localhost:9000/hook", &["presence"]))
        .await
        .unwrap();
    assert_eq!(store.get(&id).await.unwrap().url, "http://localhost:9000/hook");
}
