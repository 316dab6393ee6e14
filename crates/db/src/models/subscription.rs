//! Webhook subscription model, row mapping and create/replace DTO.

use hookcast_core::error::CoreError;
use hookcast_core::types::{SubscriptionId, Timestamp};
use hookcast_core::webhooks::{dedup_events, validate_event_names, validate_webhook_url};
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use validator::Validate;

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A persisted webhook subscription.
///
/// **Note:** the secret is never serialized; responses carry `has_secret`
/// instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub url: String,
    #[serde(rename = "has_secret", serialize_with = "serialize_secret_presence")]
    pub secret: Option<String>,
    pub events: Vec<String>,
    pub enabled: bool,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Exact membership of `event_type` in the subscribed event set.
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.events.iter().any(|e| e == event_type)
    }

    /// The signing key, if one is configured and non-empty.
    pub fn signing_secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }
}

fn serialize_secret_presence<S: Serializer>(
    secret: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_bool(secret.as_deref().is_some_and(|s| !s.is_empty()))
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// A raw row from the `webhooks` table. `events` is a JSON array string.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: String,
    pub url: String,
    pub secret: Option<String>,
    pub events: String,
    pub enabled: bool,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = serde_json::Error;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            events: serde_json::from_str(&row.events)?,
            id: row.id,
            url: row.url,
            secret: row.secret,
            enabled: row.enabled,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// DTO
// ---------------------------------------------------------------------------

/// Body for creating a subscription or replacing one wholesale.
///
/// `id` is never read from JSON; programmatic callers may preset it on
/// create. It is ignored on replace.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSubscription {
    #[serde(skip)]
    pub id: Option<SubscriptionId>,
    #[serde(default)]
    #[validate(custom(function = "validate_webhook_url"))]
    pub url: String,
    #[validate(length(max = 255, message = "secret must be at most 255 characters"))]
    pub secret: Option<String>,
    #[serde(default)]
    #[validate(
        length(min = 1, message = "at least one event must be selected"),
        custom(function = "validate_event_names")
    )]
    pub events: Vec<String>,
    #[validate(length(max = 500, message = "description must be at most 500 characters"))]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl CreateSubscription {
    /// Convenience constructor for an enabled subscription without a secret.
    pub fn new(url: impl Into<String>, events: &[&str]) -> Self {
        Self {
            id: None,
            url: url.into(),
            secret: None,
            events: events.iter().map(|e| e.to_string()).collect(),
            description: None,
            enabled: true,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Validate, then normalise: trim the URL, drop blank secret/description
    /// and collapse duplicate events.
    pub fn validated(self) -> Result<Self, CoreError> {
        self.validate()
            .map_err(|errors| CoreError::from_validation(&errors))?;

        Ok(Self {
            id: self.id,
            url: self.url.trim().to_string(),
            secret: self.secret.filter(|s| !s.is_empty()),
            events: dedup_events(self.events),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            enabled: self.enabled,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
