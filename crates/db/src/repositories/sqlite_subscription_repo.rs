//! SQLite implementation of [`SubscriptionStore`].

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use hookcast_core::types::{SubscriptionId, Timestamp};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::subscription_repo::{
    decode_matching, decode_rows, encode_events, new_record, refreshed_at, SubscriptionStore,
    INDEX_STATEMENTS, SUBSCRIPTION_COLUMNS,
};
use crate::error::StoreError;
use crate::models::subscription::{CreateSubscription, Subscription, SubscriptionRow};

const CREATE_TABLE: &str = "\
    CREATE TABLE IF NOT EXISTS webhooks ( \
        id TEXT PRIMARY KEY, \
        url TEXT NOT NULL, \
        secret TEXT, \
        events TEXT NOT NULL DEFAULT '[]', \
        enabled BOOLEAN NOT NULL DEFAULT 1, \
        description TEXT, \
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP \
    )";

/// Subscription store backed by a SQLite file or an in-memory database.
pub struct SqliteSubscriptionStore {
    pool: SqlitePool,
}

impl SqliteSubscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A private in-memory database.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SubscriptionStore for SqliteSubscriptionStore {
    async fn init_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;
        for statement in INDEX_STATEMENTS {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn create(&self, input: CreateSubscription) -> Result<SubscriptionId, StoreError> {
        let record = new_record(input, Utc::now())?;
        let events = encode_events(&record.events)?;

        let query = format!(
            "INSERT INTO webhooks ({SUBSCRIPTION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        );
        sqlx::query(&query)
            .bind(&record.id)
            .bind(&record.url)
            .bind(&record.secret)
            .bind(events)
            .bind(record.enabled)
            .bind(&record.description)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!(webhook_id = %record.id, "Subscription inserted");
        Ok(record.id)
    }

    async fn update(&self, id: &str, input: CreateSubscription) -> Result<(), StoreError> {
        let input = input.validated()?;
        let events = encode_events(&input.events)?;

        let mut tx = self.pool.begin().await?;

        let created_at: Option<Timestamp> =
            sqlx::query_scalar("SELECT created_at FROM webhooks WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(created_at) = created_at else {
            return Err(StoreError::not_found(id));
        };

        sqlx::query(
            "UPDATE webhooks SET \
                 url = ?, secret = ?, events = ?, enabled = ?, description = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&input.url)
        .bind(&input.secret)
        .bind(events)
        .bind(input.enabled)
        .bind(&input.description)
        .bind(refreshed_at(created_at, Utc::now()))
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM webhooks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Subscription, StoreError> {
        let query = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM webhooks WHERE id = ?");
        let row = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(id))?;
        Ok(Subscription::try_from(row)?)
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, StoreError> {
        let query =
            format!("SELECT {SUBSCRIPTION_COLUMNS} FROM webhooks ORDER BY created_at DESC, id");
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        decode_rows(rows)
    }

    async fn list_enabled_by_event(
        &self,
        event_type: &str,
    ) -> Result<Vec<Subscription>, StoreError> {
        let query = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM webhooks \
             WHERE enabled = TRUE ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_matching(rows, event_type))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
