//! PostgreSQL implementation of [`SubscriptionStore`].

use async_trait::async_trait;
use chrono::Utc;
use hookcast_core::types::{SubscriptionId, Timestamp};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

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
        enabled BOOLEAN NOT NULL DEFAULT TRUE, \
        description TEXT, \
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW() \
    )";

/// Subscription store backed by a PostgreSQL pool.
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool for `database_url`. The schema is not touched.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(25)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
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
            "INSERT INTO webhooks ({SUBSCRIPTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
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

        Ok(record.id)
    }

    async fn update(&self, id: &str, input: CreateSubscription) -> Result<(), StoreError> {
        let input = input.validated()?;
        let events = encode_events(&input.events)?;

        let mut tx = self.pool.begin().await?;

        let created_at: Option<Timestamp> =
            sqlx::query_scalar("SELECT created_at FROM webhooks WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(created_at) = created_at else {
            return Err(StoreError::not_found(id));
        };

        sqlx::query(
            "UPDATE webhooks SET \
                 url = $1, secret = $2, events = $3, enabled = $4, \
                 description = $5, updated_at = $6 \
             WHERE id = $7",
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
        sqlx::query("DELETE FROM webhooks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Subscription, StoreError> {
        let query = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM webhooks WHERE id = $1");
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
